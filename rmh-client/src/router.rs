//! Inbound message router
//!
//! Maps each [`SignalMessage`] kind to its local handler. Handlers read this
//! client's own copy of the session configuration and treat stale targets as
//! no-ops.

use std::sync::Arc;
use tracing::{debug, warn};

use rmh_common::events::{ClientEvent, PopoutPayload};
use rmh_common::settings::DEFAULT_XCARD_IMAGE;
use rmh_common::{SignalMessage, SoundRequest, UserId};

use crate::state::ClientState;
use crate::Result;

pub struct MessageRouter {
    state: Arc<ClientState>,
}

impl MessageRouter {
    pub fn new(state: Arc<ClientState>) -> Self {
        Self { state }
    }

    /// Run the local handler for one inbound message
    pub async fn handle(&self, message: SignalMessage) -> Result<()> {
        debug!(kind = message.kind(), local = %self.state.local_id, "Handling message");

        match message {
            SignalMessage::ShowIndicator { user_id } => self.show_indicator(&user_id).await,
            SignalMessage::HideIndicator { user_id } => {
                self.state.indicators.hide(&user_id);
                Ok(())
            }
            SignalMessage::ClearIndicators => {
                self.state.indicators.clear_all();
                Ok(())
            }
            SignalMessage::OpenHandPopout {
                user_id,
                image_path,
            } => self.open_hand_popout(&user_id, image_path).await,
            SignalMessage::CloseHandPopout { user_id } => {
                self.state.popouts.close(&user_id).await;
                Ok(())
            }
            SignalMessage::ShowBanner { name, permanent } => {
                self.state.events.emit_lossy(ClientEvent::BannerShown {
                    name,
                    permanent,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            SignalMessage::PostMessage { content, whisper } => {
                self.state.events.emit_lossy(ClientEvent::MessagePosted {
                    content,
                    whisper,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            SignalMessage::SafetySignal { name } => self.safety_signal(name).await,
            SignalMessage::PlaySound { origin, request } => {
                self.play_sound(&origin, request).await
            }
            SignalMessage::ResetRaiseControl { user_id } => {
                // Only the target's own control is touched
                if user_id == self.state.local_id {
                    self.state.lower_raise_control();
                }
                Ok(())
            }
        }
    }

    async fn show_indicator(&self, user_id: &UserId) -> Result<()> {
        if self.state.identity.get_user(user_id).is_none() {
            debug!(user_id = %user_id, "Indicator for unknown participant ignored");
            return Ok(());
        }
        let hand = self.state.config.hand().await?;
        self.state.indicators.show(user_id, hand.indicator_mode());
        Ok(())
    }

    async fn open_hand_popout(&self, user_id: &UserId, image_path: String) -> Result<()> {
        let Some(user) = self.state.identity.get_user(user_id) else {
            warn!(user_id = %user_id, "User not found, hand popout skipped");
            return Ok(());
        };
        let payload = PopoutPayload {
            user_id: Some(user.id),
            name: user.name,
            image_path,
        };
        self.state.popouts.open(user_id, payload).await?;
        Ok(())
    }

    /// Show the X-card popout and, if configured here, sound the alarm
    async fn safety_signal(&self, name: String) -> Result<()> {
        let xcard = self.state.config.xcard().await?;
        let payload = PopoutPayload {
            user_id: None,
            name,
            image_path: DEFAULT_XCARD_IMAGE.to_string(),
        };

        let popout = async { self.state.popouts.open_safety(payload).await.map(|_| ()) };
        let alarm = async {
            match xcard.sound.resolve_src() {
                Some(src) => self
                    .state
                    .sound
                    .play_local(SoundRequest::new(src, xcard.sound.volume))
                    .await
                    .map(|_| ()),
                None => Ok(()),
            }
        };

        let (popout, alarm) = tokio::join!(popout, alarm);
        if let Err(e) = &alarm {
            warn!(error = %e, "X-card alarm failed");
        }
        popout.and(alarm)
    }

    async fn play_sound(&self, origin: &UserId, request: SoundRequest) -> Result<()> {
        if *origin == self.state.local_id {
            return Ok(());
        }
        self.state.sound.play_local(request).await?;
        Ok(())
    }
}
