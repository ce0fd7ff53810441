//! Overlay-related event types

use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Popout flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopoutKind {
    /// Raised-hand detail window (single slot per client)
    Hand,
    /// X-card alert (untracked, closed by the local user)
    SafetySignal,
}

/// Data rendered into a popout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopoutPayload {
    /// Participant the popout is about; absent for anonymous X-cards
    pub user_id: Option<UserId>,
    /// Display name; empty when anonymized
    pub name: String,
    pub image_path: String,
}

/// Visible state of a live indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorPhase {
    Shown,
    Fading,
}
