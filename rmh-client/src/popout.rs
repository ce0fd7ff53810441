//! Renderable overlays and the hand-raise popout slot

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use rmh_common::events::{ClientEvent, EventBus, PopoutKind, PopoutPayload};
use rmh_common::UserId;

use crate::Result;

/// A floating window the host UI can render
#[async_trait]
pub trait Overlay: Send + Sync {
    fn id(&self) -> Uuid;

    async fn open(&self, payload: PopoutPayload) -> Result<()>;

    /// Close the window; closing a closed overlay is a no-op
    async fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Builds overlays for the host UI
pub trait OverlayFactory: Send + Sync {
    fn create(&self, kind: PopoutKind) -> Arc<dyn Overlay>;
}

/// Overlay that publishes open/close to the client event bus
pub struct BusOverlay {
    id: Uuid,
    kind: PopoutKind,
    open: AtomicBool,
    events: EventBus,
}

impl BusOverlay {
    pub fn new(kind: PopoutKind, events: EventBus) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            open: AtomicBool::new(false),
            events,
        }
    }
}

#[async_trait]
impl Overlay for BusOverlay {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn open(&self, payload: PopoutPayload) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        self.events.emit_lossy(ClientEvent::PopoutOpened {
            popout_id: self.id,
            kind: self.kind,
            payload,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.events.emit_lossy(ClientEvent::PopoutClosed {
                popout_id: self.id,
                kind: self.kind,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct BusOverlayFactory {
    events: EventBus,
}

impl BusOverlayFactory {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

impl OverlayFactory for BusOverlayFactory {
    fn create(&self, kind: PopoutKind) -> Arc<dyn Overlay> {
        Arc::new(BusOverlay::new(kind, self.events.clone()))
    }
}

struct PopoutSlot {
    overlay: Arc<dyn Overlay>,
    user_id: UserId,
}

/// Single hand-raise popout slot per client
///
/// Opening always replaces the tracked slot (last writer wins); closing only
/// acts when the slot still tracks the given participant.
pub struct PopoutRegistry {
    factory: Arc<dyn OverlayFactory>,
    slot: Mutex<Option<PopoutSlot>>,
}

impl PopoutRegistry {
    pub fn new(factory: Arc<dyn OverlayFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Open a hand-raise popout for `user_id`
    ///
    /// A popout already open for someone else stays on screen but is no
    /// longer tracked.
    pub async fn open(&self, user_id: &UserId, payload: PopoutPayload) -> Result<Uuid> {
        let overlay = self.factory.create(PopoutKind::Hand);
        let id = overlay.id();

        let mut slot = self.slot.lock().await;
        *slot = Some(PopoutSlot {
            overlay: overlay.clone(),
            user_id: user_id.clone(),
        });
        overlay.open(payload).await?;

        debug!(user_id = %user_id, popout_id = %id, "Hand popout opened");
        Ok(id)
    }

    /// Close the popout if it still belongs to `user_id`
    ///
    /// Returns whether anything was closed.
    pub async fn close(&self, user_id: &UserId) -> bool {
        let mut slot = self.slot.lock().await;
        let tracked = match slot.take() {
            Some(tracked) if tracked.user_id == *user_id => tracked,
            other => {
                *slot = other;
                return false;
            }
        };

        if let Err(e) = tracked.overlay.close().await {
            warn!(user_id = %user_id, error = %e, "Failed to close hand popout");
        }
        debug!(user_id = %user_id, "Hand popout closed");
        true
    }

    /// Participant the tracked popout belongs to
    pub async fn tracked_user(&self) -> Option<UserId> {
        self.slot.lock().await.as_ref().map(|s| s.user_id.clone())
    }

    /// Open an untracked X-card popout; only the local user closes it
    pub async fn open_safety(&self, payload: PopoutPayload) -> Result<Arc<dyn Overlay>> {
        let overlay = self.factory.create(PopoutKind::SafetySignal);
        overlay.open(payload).await?;
        debug!(popout_id = %overlay.id(), "Safety popout opened");
        Ok(overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(user: &str) -> PopoutPayload {
        PopoutPayload {
            user_id: Some(UserId::from(user)),
            name: user.to_string(),
            image_path: "assets/ui/hand.svg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_close_requires_matching_user() {
        let bus = EventBus::new(16);
        let registry = PopoutRegistry::new(Arc::new(BusOverlayFactory::new(bus)));

        registry.open(&UserId::from("a"), payload("a")).await.unwrap();
        assert!(!registry.close(&UserId::from("b")).await);
        assert_eq!(registry.tracked_user().await, Some(UserId::from("a")));

        assert!(registry.close(&UserId::from("a")).await);
        assert_eq!(registry.tracked_user().await, None);
        assert!(!registry.close(&UserId::from("a")).await);
    }

    #[tokio::test]
    async fn test_open_replaces_without_closing() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let registry = PopoutRegistry::new(Arc::new(BusOverlayFactory::new(bus)));

        registry.open(&UserId::from("a"), payload("a")).await.unwrap();
        registry.open(&UserId::from("b"), payload("b")).await.unwrap();

        assert_eq!(registry.tracked_user().await, Some(UserId::from("b")));
        // Closing the replaced user is stale
        assert!(!registry.close(&UserId::from("a")).await);

        let mut closed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ClientEvent::PopoutClosed { .. }) {
                closed += 1;
            }
        }
        assert_eq!(closed, 0);
    }

    #[tokio::test]
    async fn test_safety_popout_is_not_tracked() {
        let bus = EventBus::new(16);
        let registry = PopoutRegistry::new(Arc::new(BusOverlayFactory::new(bus)));

        let overlay = registry
            .open_safety(PopoutPayload {
                user_id: None,
                name: String::new(),
                image_path: "assets/ui/xcard.svg".to_string(),
            })
            .await
            .unwrap();

        assert!(overlay.is_open());
        assert_eq!(registry.tracked_user().await, None);
        overlay.close().await.unwrap();
        assert!(!overlay.is_open());
    }

    /// Overlay whose close always fails
    struct StuckOverlay {
        id: Uuid,
    }

    #[async_trait]
    impl Overlay for StuckOverlay {
        fn id(&self) -> Uuid {
            self.id
        }

        async fn open(&self, _payload: PopoutPayload) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Err(crate::Error::Overlay("window handle lost".into()))
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    struct StuckFactory;

    impl OverlayFactory for StuckFactory {
        fn create(&self, _kind: PopoutKind) -> Arc<dyn Overlay> {
            Arc::new(StuckOverlay { id: Uuid::new_v4() })
        }
    }

    #[tokio::test]
    async fn test_failed_close_still_releases_slot() {
        let registry = PopoutRegistry::new(Arc::new(StuckFactory));

        registry.open(&UserId::from("a"), payload("a")).await.unwrap();
        assert!(registry.close(&UserId::from("a")).await);
        assert_eq!(registry.tracked_user().await, None);
    }
}

