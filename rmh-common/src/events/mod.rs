//! Client event types and EventBus
//!
//! Every visible or audible change a client makes is published as a
//! [`ClientEvent`]. Renderers (widget templating, audio engines, test probes)
//! subscribe to the bus; the dispatch core never talks to them directly.

mod overlay_types;

pub use overlay_types::{IndicatorPhase, PopoutKind, PopoutPayload};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::identity::UserId;
use crate::settings::IndicatorMode;

/// Client-side render events
///
/// Events are broadcast via EventBus and serialize with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// A hand-raised indicator appeared next to a participant
    IndicatorShown {
        user_id: UserId,
        /// Lifetime chosen when the indicator was created
        mode: IndicatorMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Indicator started its fade-out
    IndicatorFading {
        user_id: UserId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Indicator removed from the participant list
    IndicatorRemoved {
        user_id: UserId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Popout window displayed
    PopoutOpened {
        popout_id: Uuid,
        kind: PopoutKind,
        payload: PopoutPayload,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Popout window closed
    PopoutClosed {
        popout_id: Uuid,
        kind: PopoutKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One-shot informational notice
    BannerShown {
        /// Display name of the participant who raised their hand
        name: String,
        /// Notice stays until dismissed
        permanent: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session chat message posted
    MessagePosted {
        /// HTML body
        content: String,
        /// Private recipients; empty for a public message
        whisper: Vec<UserId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Local notification sound started
    SoundStarted {
        sound_id: Uuid,
        src: String,
        /// Volume percentage `[1, 100]`
        volume: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Local notification sound stopped
    SoundStopped {
        sound_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The local raise control was switched back to "not raised"
    RaiseControlReset {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ClientEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            ClientEvent::IndicatorShown { .. } => "IndicatorShown",
            ClientEvent::IndicatorFading { .. } => "IndicatorFading",
            ClientEvent::IndicatorRemoved { .. } => "IndicatorRemoved",
            ClientEvent::PopoutOpened { .. } => "PopoutOpened",
            ClientEvent::PopoutClosed { .. } => "PopoutClosed",
            ClientEvent::BannerShown { .. } => "BannerShown",
            ClientEvent::MessagePosted { .. } => "MessagePosted",
            ClientEvent::SoundStarted { .. } => "SoundStarted",
            ClientEvent::SoundStopped { .. } => "SoundStopped",
            ClientEvent::RaiseControlReset { .. } => "RaiseControlReset",
        }
    }

    /// Participant the event concerns, when there is one
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            ClientEvent::IndicatorShown { user_id, .. }
            | ClientEvent::IndicatorFading { user_id, .. }
            | ClientEvent::IndicatorRemoved { user_id, .. } => Some(user_id),
            ClientEvent::PopoutOpened { payload, .. } => payload.user_id.as_ref(),
            _ => None,
        }
    }
}

/// Per-client event distribution bus
///
/// Wraps `tokio::broadcast`: publishing never blocks, slow subscribers see
/// `Lagged`, and dropped subscribers are cleaned up automatically.
///
/// # Examples
///
/// ```
/// use rmh_common::events::{ClientEvent, EventBus};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
///
/// bus.emit(ClientEvent::RaiseControlReset {
///     timestamp: chrono::Utc::now(),
/// })
/// .ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ClientEvent,
    ) -> Result<usize, broadcast::error::SendError<ClientEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_reports_error() {
        let bus = EventBus::new(8);
        let event = ClientEvent::RaiseControlReset {
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(ClientEvent::IndicatorShown {
            user_id: UserId::from("p-1"),
            mode: IndicatorMode::Persistent,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "IndicatorShown");
        assert_eq!(event.user_id(), Some(&UserId::from("p-1")));
    }

    #[test]
    fn test_serialized_tag() {
        let event = ClientEvent::SoundStopped {
            sound_id: Uuid::nil(),
            timestamp: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "SoundStopped");
    }
}
