//! Client-to-client wire messages
//!
//! Each variant names one remotely invocable handler. Messages are delivered
//! fire-and-forget and at most once; receivers must treat every message as
//! possibly stale.

use serde::{Deserialize, Serialize};

use crate::identity::UserId;
use crate::settings::Volume;

/// Sound to play on a receiving client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundRequest {
    pub src: String,
    pub volume: Volume,
}

impl SoundRequest {
    pub fn new(src: impl Into<String>, volume: Volume) -> Self {
        Self {
            src: src.into(),
            volume,
        }
    }
}

/// Remote handler invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Show (or restart) the hand-raised indicator for a participant
    ShowIndicator { user_id: UserId },

    /// Fade out and remove a participant's indicator
    HideIndicator { user_id: UserId },

    /// Fade out every indicator on the receiving client
    ClearIndicators,

    /// Open the hand-raise popout for a participant
    OpenHandPopout { user_id: UserId, image_path: String },

    /// Close the hand-raise popout if it still tracks this participant
    CloseHandPopout { user_id: UserId },

    /// Informational notice
    ShowBanner { name: String, permanent: bool },

    /// Session chat message; `whisper` lists private recipients
    PostMessage {
        content: String,
        whisper: Vec<UserId>,
    },

    /// X-card alert; `name` is empty when anonymized
    SafetySignal { name: String },

    /// Play a notification sound on the receiving client
    PlaySound {
        /// Client that started the sound; it never replays its own echo
        origin: UserId,
        request: SoundRequest,
    },

    /// Switch the target's raise control back to "not raised"
    ResetRaiseControl { user_id: UserId },
}

impl SignalMessage {
    /// Handler name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::ShowIndicator { .. } => "show_indicator",
            SignalMessage::HideIndicator { .. } => "hide_indicator",
            SignalMessage::ClearIndicators => "clear_indicators",
            SignalMessage::OpenHandPopout { .. } => "open_hand_popout",
            SignalMessage::CloseHandPopout { .. } => "close_hand_popout",
            SignalMessage::ShowBanner { .. } => "show_banner",
            SignalMessage::PostMessage { .. } => "post_message",
            SignalMessage::SafetySignal { .. } => "safety_signal",
            SignalMessage::PlaySound { .. } => "play_sound",
            SignalMessage::ResetRaiseControl { .. } => "reset_raise_control",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = SignalMessage::PlaySound {
            origin: UserId::from("p-1"),
            request: SoundRequest::new("assets/sounds/bell01.ogg", Volume::new(65)),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "kind": "play_sound",
                "origin": "p-1",
                "request": { "src": "assets/sounds/bell01.ogg", "volume": 65 }
            })
        );

        let unit = serde_json::to_value(SignalMessage::ClearIndicators).unwrap();
        assert_eq!(unit, json!({ "kind": "clear_indicators" }));
    }

    #[test]
    fn test_kind_matches_tag() {
        let msg = SignalMessage::CloseHandPopout {
            user_id: UserId::from("p-2"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["kind"], msg.kind());
    }
}
