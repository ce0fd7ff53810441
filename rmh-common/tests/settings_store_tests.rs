//! Settings persistence across store restarts

use std::sync::Arc;

use rmh_common::settings::{HoldTime, IndicatorMode, NotificationMode, Scope, WidthPercent};
use rmh_common::store::{ConfigStore, MemoryConfigStore, SqliteConfigStore};
use rmh_common::{HandConfig, XCardConfig};
use tempfile::TempDir;

fn db_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("session.db").display())
}

#[tokio::test]
async fn test_settings_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = SqliteConfigStore::connect(&db_url(&dir)).await.unwrap();
        let mut hand = HandConfig::default();
        hand.is_toggle = false;
        hand.notification_modes.insert(NotificationMode::Popout);
        hand.popout.scope = Scope::PrivilegedOnly;
        store.set_hand(hand).await.unwrap();
        store.set_notification_timeout(3).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteConfigStore::connect(&db_url(&dir)).await.unwrap();
    let hand = store.hand().await.unwrap();
    assert!(!hand.is_toggle);
    assert!(hand.is_enabled(NotificationMode::Popout));
    assert_eq!(hand.popout.scope, Scope::PrivilegedOnly);
    assert_eq!(store.notification_timeout().await.unwrap(), 3);
    assert_eq!(store.xcard().await.unwrap(), XCardConfig::default());
}

#[tokio::test]
async fn test_legacy_database_upgrades_once() {
    let dir = TempDir::new().unwrap();
    let url = db_url(&dir);

    {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        for (key, value) in [
            ("showUiNotification", "true"),
            ("showUiNotificationOnlyToGM", "true"),
            ("xcard", "true"),
            ("xcardAnonymousMode", "true"),
        ] {
            sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;
    }

    // Older tables lack updated_at
    let store = SqliteConfigStore::connect(&url).await.unwrap();

    let hand = store.hand().await.unwrap();
    assert!(hand.is_enabled(NotificationMode::Banner));
    assert_eq!(hand.banner.scope, Scope::PrivilegedOnly);

    let xcard = store.xcard().await.unwrap();
    assert!(xcard.enabled);
    assert!(xcard.anonymize);

    // Edits after the upgrade are not overwritten by a second open
    let mut edited = hand.clone();
    edited.banner.permanent = true;
    store.set_hand(edited.clone()).await.unwrap();
    store.pool().close().await;

    let reopened = SqliteConfigStore::connect(&url).await.unwrap();
    assert_eq!(reopened.hand().await.unwrap(), edited);
}

#[tokio::test]
async fn test_out_of_range_values_read_back_clamped_from_both_stores() {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteConfigStore::connect(&db_url(&dir)).await.unwrap();
    let memory = MemoryConfigStore::new();

    let mut hand = HandConfig::default();
    hand.is_toggle = false;
    hand.indicator.hold_time_seconds = HoldTime::new(3600);
    hand.inline_message.width_percent = WidthPercent::new(255);

    let stores: [&dyn ConfigStore; 2] = [&sqlite, &memory];
    for store in stores {
        store.set_hand(hand.clone()).await.unwrap();
        let stored = store.hand().await.unwrap();
        assert_eq!(stored.indicator.hold_time_seconds.secs(), 60);
        assert_eq!(stored.inline_message.width_percent.percent(), 100);
        assert_eq!(
            stored.indicator_mode(),
            IndicatorMode::Timed { hold_time_secs: 60 }
        );
    }
    assert_eq!(sqlite.hand().await.unwrap(), memory.hand().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_reads_do_not_clobber_concurrent_save() {
    for _ in 0..10 {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteConfigStore::connect(&db_url(&dir)).await.unwrap());

        let mut saved = HandConfig::default();
        saved.is_toggle = false;
        saved.notification_modes.insert(NotificationMode::Banner);

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.hand().await.unwrap() })
            })
            .collect();
        store.set_hand(saved.clone()).await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(store.hand().await.unwrap(), saved);
        store.pool().close().await;
    }
}
