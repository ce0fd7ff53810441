//! Per-client runtime state
//!
//! Everything a client mutates while signals come and go lives here: the
//! debounce anchor, the sound slot, the indicator and popout registries and
//! the raise control. Built once when the client starts, dropped with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rmh_common::events::{ClientEvent, EventBus};
use rmh_common::{ConfigStore, IdentityRegistry, UserId, UserInfo};

use crate::debounce::DebounceGate;
use crate::dispatch::Dispatcher;
use crate::indicator::IndicatorRegistry;
use crate::popout::{OverlayFactory, PopoutRegistry};
use crate::sound::{AudioOutput, SoundChannel};
use crate::Result;

/// Shared state for one connected client
pub struct ClientState {
    pub local_id: UserId,
    pub identity: Arc<dyn IdentityRegistry>,
    pub config: Arc<dyn ConfigStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: EventBus,

    /// Debounce anchor shared by hand raises and X-cards
    pub gate: DebounceGate,
    pub sound: SoundChannel,
    pub indicators: IndicatorRegistry,
    pub popouts: PopoutRegistry,

    /// Visual state of the local raise control (toggle mode)
    raise_control: AtomicBool,
}

impl ClientState {
    pub fn new(
        local_id: UserId,
        identity: Arc<dyn IdentityRegistry>,
        config: Arc<dyn ConfigStore>,
        events: EventBus,
        audio: Arc<dyn AudioOutput>,
        overlays: Arc<dyn OverlayFactory>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(local_id.clone(), identity.clone()));
        Self {
            sound: SoundChannel::new(local_id.clone(), audio, dispatcher.clone()),
            indicators: IndicatorRegistry::new(events.clone()),
            popouts: PopoutRegistry::new(overlays),
            gate: DebounceGate::new(),
            raise_control: AtomicBool::new(false),
            local_id,
            identity,
            config,
            dispatcher,
            events,
        }
    }

    /// The local participant as currently known to the host registry
    pub fn local_user(&self) -> Option<UserInfo> {
        self.identity.get_user(&self.local_id)
    }

    pub fn is_local_privileged(&self) -> bool {
        self.local_user().is_some_and(|user| user.is_privileged)
    }

    /// Current debounce interval from the session configuration
    pub async fn notification_timeout(&self) -> Result<Duration> {
        let seconds = self.config.notification_timeout().await?;
        Ok(Duration::from_secs(u64::from(seconds)))
    }

    pub fn is_raise_control_active(&self) -> bool {
        self.raise_control.load(Ordering::SeqCst)
    }

    pub fn set_raise_control(&self, active: bool) {
        self.raise_control.store(active, Ordering::SeqCst);
    }

    /// Switch the raise control off if it is on
    ///
    /// Returns whether it was on.
    pub fn lower_raise_control(&self) -> bool {
        let was_active = self.raise_control.swap(false, Ordering::SeqCst);
        if was_active {
            self.emit_control_reset();
        }
        was_active
    }

    /// Deassert the raise control unconditionally (throttled raise)
    pub fn revert_raise_control(&self) {
        self.raise_control.store(false, Ordering::SeqCst);
        self.emit_control_reset();
    }

    fn emit_control_reset(&self) {
        self.events.emit_lossy(ClientEvent::RaiseControlReset {
            timestamp: chrono::Utc::now(),
        });
    }
}
