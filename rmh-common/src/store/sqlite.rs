//! SQLite-backed configuration store
//!
//! Settings live in a `settings` key/value table. Each document is stored as
//! JSON text. Missing values are created from defaults on first access
//! without replacing a concurrent save; unreadable JSON is replaced by
//! defaults with a warning.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::{
    ConfigChange, ConfigStore, CHANGE_CHANNEL_CAPACITY, HAND_SETTINGS_KEY,
    NOTIFICATION_TIMEOUT_KEY, SETTINGS_ERA_KEY, XCARD_SETTINGS_KEY,
};
use crate::migration::{migrate_legacy, needs_migration, LegacySettings, CURRENT_ERA};
use crate::settings::{
    clamp_notification_timeout, HandConfig, XCardConfig, DEFAULT_NOTIFICATION_TIMEOUT_SECS,
};
use crate::Result;

/// Configuration store persisted in SQLite
pub struct SqliteConfigStore {
    db: Pool<Sqlite>,
    changes: broadcast::Sender<ConfigChange>,
    /// Serializes read-modify-publish sequences
    write_lock: Mutex<()>,
}

impl SqliteConfigStore {
    /// Connect to a database URL (`sqlite::memory:` or `sqlite://path?mode=rwc`)
    pub async fn connect(url: &str) -> Result<Self> {
        // Every in-memory connection is its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::open(pool).await
    }

    /// Wrap an existing pool, creating the table and upgrading legacy settings
    pub async fn open(db: Pool<Sqlite>) -> Result<Self> {
        create_settings_table(&db).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            db,
            changes,
            write_lock: Mutex::new(()),
        };
        store.migrate_if_needed().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }

    async fn migrate_if_needed(&self) -> Result<()> {
        let era = self
            .get_raw(SETTINGS_ERA_KEY)
            .await?
            .and_then(|raw| raw.trim().trim_matches('"').parse::<u32>().ok());

        if !needs_migration(era) {
            return Ok(());
        }

        let legacy = self.load_legacy().await?;
        if era.is_none() && legacy.is_empty() {
            debug!("Fresh settings store, no legacy values to migrate");
        } else {
            info!(from_era = ?era, to_era = CURRENT_ERA, "Migrating legacy settings");
            let (hand, xcard) = migrate_legacy(&legacy);
            self.put(HAND_SETTINGS_KEY, &hand).await?;
            self.put(XCARD_SETTINGS_KEY, &xcard).await?;
            info!("Legacy settings migration complete");
        }

        self.put(SETTINGS_ERA_KEY, &CURRENT_ERA).await
    }

    /// Every stored key that is not part of the current schema
    async fn load_legacy(&self) -> Result<LegacySettings> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.db)
            .await?;

        let mut values = Map::new();
        for (key, raw) in rows {
            if is_current_key(&key) {
                continue;
            }
            // Legacy rows may hold bare strings rather than JSON
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            values.insert(key, value);
        }
        Ok(LegacySettings::from_map(values))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(value)
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(json)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Insert `value` only when `key` has no row yet
    ///
    /// Returns `false` when a row already exists, leaving it untouched.
    async fn insert_if_absent<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        let json = serde_json::to_string(value)?;
        let result = sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(json)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load a document, storing `default` when it is absent or unreadable
    ///
    /// A missing row is only ever filled in, never overwritten, so a reader
    /// racing a concurrent save keeps the saved value.
    async fn load_or_init<T, F>(&self, key: &str, default: T, parse: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce(Value) -> T,
    {
        let raw = match self.get_raw(key).await? {
            Some(raw) => raw,
            None => {
                if self.insert_if_absent(key, &default).await? {
                    return Ok(default);
                }
                debug!(key, "Setting written concurrently, re-reading");
                match self.get_raw(key).await? {
                    Some(raw) => raw,
                    None => return Ok(default),
                }
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(parse(value)),
            Err(e) => {
                warn!(key, error = %e, "Unreadable setting, restoring default");
                self.put(key, &default).await?;
                Ok(default)
            }
        }
    }

    fn publish(&self, change: ConfigChange) {
        let _ = self.changes.send(change);
    }
}

fn is_current_key(key: &str) -> bool {
    matches!(
        key,
        HAND_SETTINGS_KEY | XCARD_SETTINGS_KEY | NOTIFICATION_TIMEOUT_KEY | SETTINGS_ERA_KEY
    )
}

async fn create_settings_table(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(db)
    .await?;

    // Tables written by older versions have no updated_at column
    let has_updated_at: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('settings') WHERE name = 'updated_at'",
    )
    .fetch_one(db)
    .await?;
    if has_updated_at == 0 {
        info!("Adding updated_at column to settings table");
        sqlx::query("ALTER TABLE settings ADD COLUMN updated_at TIMESTAMP")
            .execute(db)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn hand(&self) -> Result<HandConfig> {
        self.load_or_init(HAND_SETTINGS_KEY, HandConfig::default(), HandConfig::from)
            .await
    }

    async fn xcard(&self) -> Result<XCardConfig> {
        self.load_or_init(XCARD_SETTINGS_KEY, XCardConfig::default(), XCardConfig::from)
            .await
    }

    async fn notification_timeout(&self) -> Result<u32> {
        self.load_or_init(
            NOTIFICATION_TIMEOUT_KEY,
            DEFAULT_NOTIFICATION_TIMEOUT_SECS,
            |value| match value.as_f64() {
                Some(n) if n.is_finite() => clamp_notification_timeout(n.round() as i64),
                _ => DEFAULT_NOTIFICATION_TIMEOUT_SECS,
            },
        )
        .await
    }

    async fn set_hand(&self, config: HandConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.hand().await?;
        if previous == config {
            return Ok(());
        }
        self.put(HAND_SETTINGS_KEY, &config).await?;

        debug!(is_toggle = config.is_toggle, "Hand settings saved");
        self.publish(ConfigChange::Hand {
            previous,
            current: config,
        });
        Ok(())
    }

    async fn set_xcard(&self, config: XCardConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.xcard().await?;
        if previous == config {
            return Ok(());
        }
        self.put(XCARD_SETTINGS_KEY, &config).await?;

        debug!(enabled = config.enabled, "X-card settings saved");
        self.publish(ConfigChange::XCard {
            previous,
            current: config,
        });
        Ok(())
    }

    async fn set_notification_timeout(&self, seconds: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let current = clamp_notification_timeout(seconds as i64);
        let previous = self.notification_timeout().await?;
        if previous == current {
            return Ok(());
        }
        self.put(NOTIFICATION_TIMEOUT_KEY, &current).await?;

        debug!(seconds = current, "Notification timeout saved");
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
    use crate::settings::{NotificationMode, Scope};

    async fn memory_store() -> SqliteConfigStore {
        SqliteConfigStore::connect("sqlite::memory:").await.unwrap()
    }

    async fn raw(store: &SqliteConfigStore, key: &str) -> Option<String> {
        store.get_raw(key).await.unwrap()
    }

    #[tokio::test]
    async fn test_fresh_store_writes_era_and_defaults() {
        let store = memory_store().await;
        assert_eq!(raw(&store, SETTINGS_ERA_KEY).await.as_deref(), Some("2"));
        assert!(raw(&store, HAND_SETTINGS_KEY).await.is_none());

        let hand = store.hand().await.unwrap();
        assert_eq!(hand, HandConfig::default());
        // Written back on first access
        assert!(raw(&store, HAND_SETTINGS_KEY).await.is_some());
    }

    #[tokio::test]
    async fn test_default_never_replaces_existing_row() {
        let store = memory_store().await;
        let mut saved = HandConfig::default();
        saved.is_toggle = false;
        store.put(HAND_SETTINGS_KEY, &saved).await.unwrap();

        let inserted = store
            .insert_if_absent(HAND_SETTINGS_KEY, &HandConfig::default())
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(store.hand().await.unwrap(), saved);

        assert!(store
            .insert_if_absent(XCARD_SETTINGS_KEY, &XCardConfig::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_replaced() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
            .bind(XCARD_SETTINGS_KEY)
            .bind("{not json")
            .execute(store.pool())
            .await
            .unwrap();

        assert_eq!(store.xcard().await.unwrap(), XCardConfig::default());
        let stored = raw(&store, XCARD_SETTINGS_KEY).await.unwrap();
        assert!(serde_json::from_str::<Value>(&stored).is_ok());
    }

    #[tokio::test]
    async fn test_set_and_reload() {
        let store = memory_store().await;
        let mut rx = store.subscribe();

        let mut config = XCardConfig::default();
        config.enabled = true;
        config.scope = Scope::PrivilegedOnly;
        store.set_xcard(config.clone()).await.unwrap();

        assert_eq!(store.xcard().await.unwrap(), config);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ConfigChange::XCard { current, .. } if current.enabled
        ));
    }

    #[tokio::test]
    async fn test_notification_timeout_roundtrip_and_clamp() {
        let store = memory_store().await;
        assert_eq!(store.notification_timeout().await.unwrap(), 10);

        store.set_notification_timeout(90).await.unwrap();
        assert_eq!(store.notification_timeout().await.unwrap(), 60);
        assert_eq!(raw(&store, NOTIFICATION_TIMEOUT_KEY).await.as_deref(), Some("60"));
    }

    #[tokio::test]
    async fn test_legacy_rows_are_migrated_on_open() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_settings_table(&pool).await.unwrap();
        for (key, value) in [
            ("handToogleBehavior", "false"),
            ("playSound", "true"),
            ("showEmojiIndicator", "true"),
            ("xcard", "true"),
            ("xcardsound", "false"),
        ] {
            sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .unwrap();
        }

        let store = SqliteConfigStore::open(pool).await.unwrap();
        let hand = store.hand().await.unwrap();
        let xcard = store.xcard().await.unwrap();

        assert!(!hand.is_toggle);
        assert!(hand.is_enabled(NotificationMode::Sound));
        assert!(hand.is_enabled(NotificationMode::Indicator));
        assert!(xcard.enabled);
        assert_eq!(xcard.sound.resolve_src(), None);
        assert_eq!(raw(&store, SETTINGS_ERA_KEY).await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_current_era_is_not_migrated_again() {
        let store = memory_store().await;
        let mut hand = HandConfig::default();
        hand.is_toggle = false;
        store.set_hand(hand.clone()).await.unwrap();

        // Re-opening the same pool must keep the saved document
        let reopened = SqliteConfigStore::open(store.pool().clone()).await.unwrap();
        assert_eq!(reopened.hand().await.unwrap(), hand);
    }
}
