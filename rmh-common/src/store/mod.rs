//! Session configuration store
//!
//! Holds the replicated hand-raise, X-card and debounce settings, and
//! publishes a [`ConfigChange`] whenever a stored value actually changes.
//! Reads always return a valid configuration: missing values are created
//! from defaults on first access.

mod memory;
#[cfg(feature = "sqlx")]
mod sqlite;

pub use memory::MemoryConfigStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteConfigStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::settings::{HandConfig, XCardConfig};
use crate::Result;

/// Storage key for [`HandConfig`]
pub const HAND_SETTINGS_KEY: &str = "handSettings";

/// Storage key for [`XCardConfig`]
pub const XCARD_SETTINGS_KEY: &str = "xCardSettings";

/// Storage key for the debounce timeout (seconds)
pub const NOTIFICATION_TIMEOUT_KEY: &str = "notificationTimeout";

/// Storage key for the settings schema era marker
pub const SETTINGS_ERA_KEY: &str = "settingsEra";

/// Buffered change notifications per subscriber
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Notification emitted after a stored value changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key")]
pub enum ConfigChange {
    Hand {
        previous: HandConfig,
        current: HandConfig,
    },
    XCard {
        previous: XCardConfig,
        current: XCardConfig,
    },
    NotificationTimeout { previous: u32, current: u32 },
}

impl ConfigChange {
    /// True when a hand change switched the raise control from toggle to momentary
    ///
    /// Persistent indicators would otherwise never be hidden.
    pub fn leaves_toggle_mode(&self) -> bool {
        matches!(
            self,
            ConfigChange::Hand { previous, current } if previous.is_toggle && !current.is_toggle
        )
    }
}

/// Read/write access to the session configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn hand(&self) -> Result<HandConfig>;

    async fn xcard(&self) -> Result<XCardConfig>;

    /// Minimum seconds between two signals from one client, `[0, 60]`
    async fn notification_timeout(&self) -> Result<u32>;

    async fn set_hand(&self, config: HandConfig) -> Result<()>;

    async fn set_xcard(&self, config: XCardConfig) -> Result<()>;

    /// Store the debounce timeout, clamped into `[0, 60]`
    async fn set_notification_timeout(&self, seconds: u32) -> Result<()>;

    /// Subscribe to future changes
    fn subscribe(&self) -> broadcast::Receiver<ConfigChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaves_toggle_mode() {
        let toggle = HandConfig::default();
        let mut momentary = HandConfig::default();
        momentary.is_toggle = false;

        let change = ConfigChange::Hand {
            previous: toggle.clone(),
            current: momentary.clone(),
        };
        assert!(change.leaves_toggle_mode());

        let change = ConfigChange::Hand {
            previous: momentary,
            current: toggle,
        };
        assert!(!change.leaves_toggle_mode());

        let change = ConfigChange::NotificationTimeout {
            previous: 10,
            current: 0,
        };
        assert!(!change.leaves_toggle_mode());
    }
}
