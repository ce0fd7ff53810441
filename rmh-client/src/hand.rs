//! Hand-raise orchestrator
//!
//! `Idle --raise--> Signaled --lower--> Idle`, per local client. A raise fans
//! out to every enabled notification mode concurrently; a lower always hides
//! the indicator and closes the popout, whatever modes are enabled now.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use rmh_common::settings::{HandConfig, InlineMessageConfig, NotificationMode};
use rmh_common::{Scope, SignalMessage, SoundRequest, UserId, UserInfo};

use crate::outcome::{fan_out, DispatchReport, SignalOutcome};
use crate::sound::Audience;
use crate::state::ClientState;
use crate::Result;

/// Line shown under the participant's name in the inline message
const RAISED_HAND_TEXT: &str = "raised their hand";

pub struct HandOrchestrator {
    state: Arc<ClientState>,
}

impl HandOrchestrator {
    pub fn new(state: Arc<ClientState>) -> Self {
        Self { state }
    }

    /// Raise the local participant's hand
    pub async fn raise(&self) -> Result<SignalOutcome> {
        let timeout = self.state.notification_timeout().await?;
        if !self.state.gate.try_consume(timeout) {
            return Ok(SignalOutcome::Throttled);
        }

        let Some(user) = self.state.local_user() else {
            warn!(user_id = %self.state.local_id, "Current user not found");
            return Ok(SignalOutcome::IdentityMissing);
        };
        let hand = self.state.config.hand().await?;

        info!(user_id = %user.id, modes = ?hand.notification_modes, "Raising hand");
        let handlers = hand
            .notification_modes
            .iter()
            .map(|mode| (channel_name(*mode), self.notify(*mode, &user, &hand)));
        let report = fan_out(handlers).await;

        Ok(SignalOutcome::Dispatched(report))
    }

    /// Lower the local participant's hand on every client
    pub async fn lower(&self) -> Result<SignalOutcome> {
        let user_id = self.state.local_id.clone();
        debug!(user_id = %user_id, "Lowering hand");
        Ok(SignalOutcome::Dispatched(self.retract(&user_id).await))
    }

    /// Lower another participant's hand
    ///
    /// Privileged participants may lower anyone's hand; everyone else only
    /// their own. The target's raise control is reset on their client only.
    pub async fn lower_for_user(&self, target: &UserId) -> Result<SignalOutcome> {
        if *target != self.state.local_id && !self.state.is_local_privileged() {
            warn!(target = %target, "Lowering another participant's hand requires privilege");
            return Ok(SignalOutcome::NotPermitted);
        }

        info!(target = %target, by = %self.state.local_id, "Lowering hand for user");
        let mut report = self.retract(target).await;
        let reset = self
            .state
            .dispatcher
            .send_to(
                target,
                SignalMessage::ResetRaiseControl {
                    user_id: target.clone(),
                },
            )
            .await;
        if reset {
            report.completed.push("raise_control");
        }

        Ok(SignalOutcome::Dispatched(report))
    }

    /// Entry point for the toggle control
    ///
    /// A throttled raise switches the control back off.
    pub async fn toggle(&self, active: bool) -> Result<SignalOutcome> {
        if !active {
            self.state.set_raise_control(false);
            return self.lower().await;
        }

        let timeout = self.state.notification_timeout().await?;
        if !self.state.gate.would_pass(timeout) {
            self.state.revert_raise_control();
            return Ok(SignalOutcome::Throttled);
        }

        self.state.set_raise_control(true);
        let outcome = self.raise().await?;
        if !outcome.is_dispatched() {
            self.state.revert_raise_control();
        }
        Ok(outcome)
    }

    /// Fade out every indicator on every client (privileged only)
    pub async fn clear_indicators(&self) -> Result<SignalOutcome> {
        if !self.state.is_local_privileged() {
            return Ok(SignalOutcome::NotPermitted);
        }
        let sent = self
            .state
            .dispatcher
            .broadcast(SignalMessage::ClearIndicators)
            .await;
        let mut report = DispatchReport::default();
        if sent {
            report.completed.push("indicator");
        }
        Ok(SignalOutcome::Dispatched(report))
    }

    /// Whether this client currently shows `user_id`'s hand as raised
    pub async fn is_hand_raised(&self, user_id: &UserId) -> Result<bool> {
        let hand = self.state.config.hand().await?;

        if hand.is_enabled(NotificationMode::Indicator) && self.state.indicators.is_live(user_id)
        {
            return Ok(true);
        }
        if hand.is_enabled(NotificationMode::Popout)
            && self.state.popouts.tracked_user().await.as_ref() == Some(user_id)
        {
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether the "lower hand" option applies to `target` for this client
    pub async fn can_lower_for(&self, target: &UserId) -> Result<bool> {
        let hand = self.state.config.hand().await?;
        if !hand.is_toggle {
            return Ok(false);
        }
        if self.state.identity.get_user(target).is_none() {
            return Ok(false);
        }
        if !self.state.is_local_privileged() && *target != self.state.local_id {
            return Ok(false);
        }
        self.is_hand_raised(target).await
    }

    async fn retract(&self, user_id: &UserId) -> DispatchReport {
        let dispatcher = &self.state.dispatcher;
        let handlers = [
            (
                "indicator",
                dispatcher.broadcast(SignalMessage::HideIndicator {
                    user_id: user_id.clone(),
                }),
            ),
            (
                "popout",
                dispatcher.broadcast(SignalMessage::CloseHandPopout {
                    user_id: user_id.clone(),
                }),
            ),
        ];
        fan_out(handlers.map(|(channel, sent)| (channel, async move { Ok(sent.await) }))).await
    }

    async fn notify(&self, mode: NotificationMode, user: &UserInfo, hand: &HandConfig) -> Result<bool> {
        let dispatcher = &self.state.dispatcher;
        let scope = hand.scope_for(mode);

        match mode {
            NotificationMode::Indicator => Ok(dispatcher
                .dispatch(
                    scope,
                    SignalMessage::ShowIndicator {
                        user_id: user.id.clone(),
                    },
                )
                .await),

            NotificationMode::Sound => {
                let request = SoundRequest::new(hand.sound.resolve_src(), hand.sound.volume);
                self.state
                    .sound
                    .play_replacing(request, self.audience(scope))
                    .await?;
                Ok(true)
            }

            NotificationMode::Popout => Ok(dispatcher
                .dispatch(
                    scope,
                    SignalMessage::OpenHandPopout {
                        user_id: user.id.clone(),
                        image_path: hand.popout.resolve_image(&user.avatar),
                    },
                )
                .await),

            NotificationMode::Banner => Ok(dispatcher
                .dispatch(
                    scope,
                    SignalMessage::ShowBanner {
                        name: user.name.clone(),
                        permanent: hand.banner.permanent,
                    },
                )
                .await),

            NotificationMode::InlineMessage => {
                let whisper = match scope {
                    Scope::Everyone => Vec::new(),
                    Scope::PrivilegedOnly => self.state.identity.list_active_privileged_ids(),
                };
                let content = render_inline_message(user, &hand.inline_message);
                Ok(dispatcher
                    .dispatch(scope, SignalMessage::PostMessage { content, whisper })
                    .await)
            }
        }
    }

    /// Concrete sound audience; privileged scope becomes an explicit id list
    fn audience(&self, scope: Scope) -> Audience {
        match scope {
            Scope::Everyone => Audience::All,
            Scope::PrivilegedOnly => Audience::Users(
                self.state
                    .identity
                    .list_active_privileged_ids()
                    .into_iter()
                    .collect::<BTreeSet<_>>(),
            ),
        }
    }
}

fn channel_name(mode: NotificationMode) -> &'static str {
    match mode {
        NotificationMode::Indicator => "indicator",
        NotificationMode::Sound => "sound",
        NotificationMode::Popout => "popout",
        NotificationMode::Banner => "banner",
        NotificationMode::InlineMessage => "inline_message",
    }
}

/// HTML body for the inline session message
pub fn render_inline_message(user: &UserInfo, config: &InlineMessageConfig) -> String {
    let mut html = format!(
        "<div class=\"raised-hand\"><p><strong>{}</strong> {}</p>",
        escape_html(&user.name),
        RAISED_HAND_TEXT
    );
    if let Some(src) = config.resolve_image(&user.avatar) {
        html.push_str(&format!(
            "<img src=\"{}\" style=\"width: {}\"/>",
            escape_html(&src),
            config.width_percent
        ));
    }
    html.push_str("</div>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmh_common::settings::{InlineImageSource, WidthPercent};

    #[test]
    fn test_inline_message_escapes_name() {
        let user = UserInfo::new("p-1", "<Bob & \"Co\">");
        let html = render_inline_message(&user, &InlineMessageConfig::default());

        assert!(html.contains("&lt;Bob &amp; &quot;Co&quot;&gt;"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_inline_message_with_avatar() {
        let user = UserInfo::new("p-1", "Alice").with_avatar("avatars/alice.png");
        let config = InlineMessageConfig {
            source: InlineImageSource::Avatar,
            width_percent: WidthPercent::new(40),
            ..Default::default()
        };
        let html = render_inline_message(&user, &config);

        assert!(html.contains("<img src=\"avatars/alice.png\" style=\"width: 40%\"/>"));
        assert!(html.contains(RAISED_HAND_TEXT));
    }

    #[test]
    fn test_channel_names_are_distinct() {
        let names: BTreeSet<_> = NotificationMode::ALL.iter().map(|m| channel_name(*m)).collect();
        assert_eq!(names.len(), NotificationMode::ALL.len());
    }
}
