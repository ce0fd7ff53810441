//! X-card (safety signal) orchestrator

use std::sync::Arc;
use tracing::{info, warn};

use rmh_common::SignalMessage;

use crate::outcome::{fan_out, SignalOutcome};
use crate::state::ClientState;
use crate::Result;

pub struct SafetyOrchestrator {
    state: Arc<ClientState>,
}

impl SafetyOrchestrator {
    pub fn new(state: Arc<ClientState>) -> Self {
        Self { state }
    }

    /// Raise an X-card
    ///
    /// A disabled X-card returns before the debounce gate, so it never
    /// delays a later hand raise. Receivers pick the alarm from their own
    /// configuration; only the (possibly blank) name travels.
    pub async fn trigger(&self) -> Result<SignalOutcome> {
        let xcard = self.state.config.xcard().await?;
        if !xcard.enabled {
            return Ok(SignalOutcome::Disabled);
        }

        let timeout = self.state.notification_timeout().await?;
        if !self.state.gate.try_consume(timeout) {
            return Ok(SignalOutcome::Throttled);
        }

        let Some(user) = self.state.local_user() else {
            warn!(user_id = %self.state.local_id, "Current user not found");
            return Ok(SignalOutcome::IdentityMissing);
        };

        let name = if xcard.anonymize {
            String::new()
        } else {
            user.name
        };
        info!(anonymous = xcard.anonymize, scope = ?xcard.scope, "X-card raised");

        let dispatcher = &self.state.dispatcher;
        let signal = async {
            Ok(dispatcher
                .dispatch(xcard.scope, SignalMessage::SafetySignal { name })
                .await)
        };
        Ok(SignalOutcome::Dispatched(fan_out([("safety", signal)]).await))
    }
}
