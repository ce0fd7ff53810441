//! In-memory configuration store

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{ConfigChange, ConfigStore, CHANGE_CHANNEL_CAPACITY};
use crate::settings::{
    clamp_notification_timeout, HandConfig, XCardConfig, DEFAULT_NOTIFICATION_TIMEOUT_SECS,
};
use crate::Result;

struct Values {
    hand: HandConfig,
    xcard: XCardConfig,
    notification_timeout: u32,
}

/// Configuration store kept in process memory
///
/// Used by the in-process session simulator and by tests. Every client of one
/// session shares the same instance, which stands in for replication.
pub struct MemoryConfigStore {
    values: RwLock<Values>,
    changes: broadcast::Sender<ConfigChange>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::with_values(
            HandConfig::default(),
            XCardConfig::default(),
            DEFAULT_NOTIFICATION_TIMEOUT_SECS,
        )
    }

    pub fn with_values(hand: HandConfig, xcard: XCardConfig, notification_timeout: u32) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(Values {
                hand,
                xcard,
                notification_timeout: clamp_notification_timeout(notification_timeout as i64),
            }),
            changes,
        }
    }

    fn publish(&self, change: ConfigChange) {
        // Nobody listening is fine
        let _ = self.changes.send(change);
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn hand(&self) -> Result<HandConfig> {
        Ok(self.values.read().await.hand.clone())
    }

    async fn xcard(&self) -> Result<XCardConfig> {
        Ok(self.values.read().await.xcard.clone())
    }

    async fn notification_timeout(&self) -> Result<u32> {
        Ok(self.values.read().await.notification_timeout)
    }

    async fn set_hand(&self, config: HandConfig) -> Result<()> {
        let mut values = self.values.write().await;
        if values.hand == config {
            return Ok(());
        }
        let previous = std::mem::replace(&mut values.hand, config.clone());
        drop(values);

        debug!(is_toggle = config.is_toggle, "Hand settings updated");
        self.publish(ConfigChange::Hand {
            previous,
            current: config,
        });
        Ok(())
    }

    async fn set_xcard(&self, config: XCardConfig) -> Result<()> {
        let mut values = self.values.write().await;
        if values.xcard == config {
            return Ok(());
        }
        let previous = std::mem::replace(&mut values.xcard, config.clone());
        drop(values);

        debug!(enabled = config.enabled, "X-card settings updated");
        self.publish(ConfigChange::XCard {
            previous,
            current: config,
        });
        Ok(())
    }

    async fn set_notification_timeout(&self, seconds: u32) -> Result<()> {
        let current = clamp_notification_timeout(seconds as i64);
        let mut values = self.values.write().await;
        if values.notification_timeout == current {
            return Ok(());
        }
        let previous = std::mem::replace(&mut values.notification_timeout, current);
        drop(values);

        debug!(seconds = current, "Notification timeout updated");
        self.publish(ConfigChange::NotificationTimeout { previous, current });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_on_first_access() {
        let store = MemoryConfigStore::new();
        assert_eq!(store.hand().await.unwrap(), HandConfig::default());
        assert_eq!(store.xcard().await.unwrap(), XCardConfig::default());
        assert_eq!(store.notification_timeout().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_change_notification_carries_both_values() {
        let store = MemoryConfigStore::new();
        let mut rx = store.subscribe();

        let mut momentary = HandConfig::default();
        momentary.is_toggle = false;
        store.set_hand(momentary.clone()).await.unwrap();

        match rx.recv().await.unwrap() {
            ConfigChange::Hand { previous, current } => {
                assert!(previous.is_toggle);
                assert_eq!(current, momentary);
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unchanged_value_is_silent() {
        let store = MemoryConfigStore::new();
        let mut rx = store.subscribe();

        store.set_hand(HandConfig::default()).await.unwrap();
        store.set_notification_timeout(10).await.unwrap();

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_clamped() {
        let store = MemoryConfigStore::new();
        store.set_notification_timeout(500).await.unwrap();
        assert_eq!(store.notification_timeout().await.unwrap(), 60);
    }
}
