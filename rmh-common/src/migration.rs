//! One-time upgrade of pre-era-2 flat settings
//!
//! Older sessions stored every option as its own flat key. The upgrade builds
//! candidate documents in the current shape and feeds them through the lenient
//! settings deserializers, so anything missing or invalid becomes a default.

use serde_json::{json, Map, Value};

use crate::settings::{HandConfig, XCardConfig};

/// Settings schema era written by this version
pub const CURRENT_ERA: u32 = 2;

/// Era assumed when no marker has been stored
pub const DEFAULT_ERA: u32 = 1;

/// Default legacy volume fraction
const LEGACY_DEFAULT_VOLUME: f64 = 0.6;

/// Flat legacy key/value settings
#[derive(Debug, Clone, Default)]
pub struct LegacySettings {
    values: Map<String, Value>,
}

impl LegacySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// JavaScript-style truthiness; absent keys are false
    fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    fn value(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Fractional volume as a percentage, never below 1
    fn volume_percent(&self, key: &str) -> i64 {
        let fraction = self
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(LEGACY_DEFAULT_VOLUME);
        ((fraction * 100.0).round() as i64).max(1)
    }

    fn scope(&self, privileged_key: &str) -> &'static str {
        if self.flag(privileged_key) {
            "privileged-only"
        } else {
            "everyone"
        }
    }
}

/// Whether a stored era marker predates the current schema
pub fn needs_migration(stored_era: Option<u32>) -> bool {
    stored_era.unwrap_or(DEFAULT_ERA) < CURRENT_ERA
}

/// Map flat legacy settings onto the current hand and X-card documents
pub fn migrate_legacy(old: &LegacySettings) -> (HandConfig, XCardConfig) {
    let show_indicator = match old.get("showEmojiIndicator") {
        None => true,
        Some(_) => old.flag("showEmojiIndicator"),
    };
    let modes: Vec<&str> = [
        (show_indicator, "indicator"),
        (old.flag("showDialogMessage"), "popout"),
        (old.flag("playSound"), "sound"),
        (old.flag("showUiNotification"), "banner"),
        (old.flag("showUiChatMessage"), "inline-message"),
    ]
    .into_iter()
    .filter_map(|(enabled, mode)| enabled.then_some(mode))
    .collect();

    let show_image = old.flag("showImageChatMessage");
    let user_art = old.flag("chatMessageImageUserArt");
    let popout_source = match (show_image, user_art) {
        (false, _) => "default",
        (true, true) => "avatar",
        (true, false) => "custom",
    };
    let inline_source = match (show_image, user_art) {
        (false, _) => "none",
        (true, true) => "avatar",
        (true, false) => "custom",
    };

    let hand_sound_source = if old.flag("warningsoundpath") {
        "custom"
    } else {
        "default"
    };
    let xcard_sound_source = if old.flag("xcardsound") {
        "default"
    } else {
        "none"
    };

    let hand = json!({
        "isToggle": old.value("handToogleBehavior"),
        "notificationModes": modes,
        "sound": {
            "scope": old.scope("playSoundGMOnly"),
            "source": hand_sound_source,
            "path": old.value("warningsoundpath"),
            "volume": old.volume_percent("warningsoundvolume"),
        },
        "popout": {
            "scope": "everyone",
            "source": popout_source,
            "path": old.value("chatimagepath"),
        },
        "banner": {
            "scope": old.scope("showUiNotificationOnlyToGM"),
            "permanent": old.value("makeUiNotificationPermanent"),
        },
        "inlineMessage": {
            "scope": old.scope("showUiChatMessageOnlyForGM"),
            "source": inline_source,
            "path": old.value("chatimagepath"),
            "widthPercent": old.value("chatimagewidth"),
        },
    });

    let xcard = json!({
        "enabled": old.value("xcard"),
        "scope": old.scope("xcardgmonly"),
        "anonymize": old.value("xcardAnonymousMode"),
        "sound": {
            "source": xcard_sound_source,
            "volume": old.volume_percent("xcardsoundvolume"),
        },
    });

    (HandConfig::from(hand), XCardConfig::from(xcard))
}
