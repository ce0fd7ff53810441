//! Hand-raise settings

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

use super::{
    clamped_number, lenient, lenient_bool, lenient_string, non_blank_or, HoldTime, Scope, Volume,
    WidthPercent, DEFAULT_HAND_IMAGE, DEFAULT_HAND_SOUND,
};

/// Delivery channel for a raised hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationMode {
    /// Marker next to the participant's name
    #[serde(alias = "playerList")]
    Indicator,
    /// Chime
    #[serde(alias = "aural")]
    Sound,
    /// Floating detail window
    Popout,
    /// One-shot informational notice
    #[serde(alias = "ui")]
    Banner,
    /// Session chat message
    #[serde(alias = "chat")]
    InlineMessage,
}

impl NotificationMode {
    pub const ALL: [NotificationMode; 5] = [
        NotificationMode::Indicator,
        NotificationMode::Sound,
        NotificationMode::Popout,
        NotificationMode::Banner,
        NotificationMode::InlineMessage,
    ];
}

/// Indicator lifetime, fixed when the indicator is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorMode {
    /// Stays until explicitly hidden (toggle raise mode)
    Persistent,
    /// Fades out on its own after the animation plus the hold time
    Timed { hold_time_secs: u32 },
}

impl IndicatorMode {
    /// Hold time for timed indicators
    pub fn hold(&self) -> Option<Duration> {
        match self {
            IndicatorMode::Persistent => None,
            IndicatorMode::Timed { hold_time_secs } => {
                Some(Duration::from_secs(u64::from(*hold_time_secs)))
            }
        }
    }
}

/// Indicator channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct IndicatorConfig {
    pub scope: Scope,
    /// Time a momentary indicator lingers after its wave animation
    pub hold_time_seconds: HoldTime,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            scope: Scope::Everyone,
            hold_time_seconds: HoldTime::new(10),
        }
    }
}

impl From<Value> for IndicatorConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let hold = value
            .get("holdTimeSeconds")
            .or_else(|| value.get("holdTime"));
        Self {
            scope: lenient(value.get("scope").cloned(), d.scope),
            hold_time_seconds: HoldTime::new(clamped_number(
                hold,
                0,
                HoldTime::MAX_SECS as i64,
                d.hold_time_seconds.secs() as i64,
            )),
        }
    }
}

/// Where the hand-raise chime comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSoundSource {
    #[default]
    Default,
    Custom,
}

/// Sound channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct HandSoundConfig {
    pub scope: Scope,
    pub source: HandSoundSource,
    /// Custom sound path, used when `source` is `custom`
    pub path: String,
    pub volume: Volume,
}

impl HandSoundConfig {
    /// Sound file to play; a blank custom path falls back to the default chime
    pub fn resolve_src(&self) -> String {
        match self.source {
            HandSoundSource::Default => DEFAULT_HAND_SOUND.to_string(),
            HandSoundSource::Custom => non_blank_or(&self.path, DEFAULT_HAND_SOUND),
        }
    }
}

impl Default for HandSoundConfig {
    fn default() -> Self {
        Self {
            scope: Scope::Everyone,
            source: HandSoundSource::Default,
            path: String::new(),
            volume: Volume::new(65),
        }
    }
}

impl From<Value> for HandSoundConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let path = value.get("path").or_else(|| value.get("overridePath"));
        let volume = value.get("volume").or_else(|| value.get("soundVolume"));
        Self {
            scope: lenient(value.get("scope").cloned(), d.scope),
            source: lenient(value.get("source").cloned(), d.source),
            path: lenient_string(path, &d.path),
            volume: Volume::new(clamped_number(
                volume,
                Volume::MIN as i64,
                Volume::MAX as i64,
                d.volume.percent() as i64,
            )),
        }
    }
}

/// Image shown in the hand-raise popout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopoutImageSource {
    #[default]
    Default,
    Avatar,
    Custom,
}

/// Popout channel settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct PopoutConfig {
    pub scope: Scope,
    pub source: PopoutImageSource,
    /// Custom image path, used when `source` is `custom`
    pub path: String,
}

impl PopoutConfig {
    /// Image for the popout; blank avatar or custom paths fall back to the default hand
    pub fn resolve_image(&self, avatar: &str) -> String {
        match self.source {
            PopoutImageSource::Default => DEFAULT_HAND_IMAGE.to_string(),
            PopoutImageSource::Avatar => non_blank_or(avatar, DEFAULT_HAND_IMAGE),
            PopoutImageSource::Custom => non_blank_or(&self.path, DEFAULT_HAND_IMAGE),
        }
    }
}

impl From<Value> for PopoutConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let path = value.get("path").or_else(|| value.get("overridePath"));
        Self {
            scope: lenient(value.get("scope").cloned(), d.scope),
            source: lenient(value.get("source").cloned(), d.source),
            path: lenient_string(path, &d.path),
        }
    }
}

/// Banner channel settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct BannerConfig {
    pub scope: Scope,
    /// Notice stays until dismissed
    pub permanent: bool,
}

impl From<Value> for BannerConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        Self {
            scope: lenient(value.get("scope").cloned(), d.scope),
            permanent: lenient_bool(value.get("permanent"), d.permanent),
        }
    }
}

/// Image attached to the inline session message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineImageSource {
    #[default]
    None,
    Default,
    Avatar,
    Custom,
}

/// Inline-message channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct InlineMessageConfig {
    pub scope: Scope,
    pub source: InlineImageSource,
    /// Custom image path, used when `source` is `custom`
    pub path: String,
    /// Rendered image width relative to the message
    pub width_percent: WidthPercent,
}

impl InlineMessageConfig {
    /// Image for the message body, if any
    pub fn resolve_image(&self, avatar: &str) -> Option<String> {
        match self.source {
            InlineImageSource::None => None,
            InlineImageSource::Default => Some(DEFAULT_HAND_IMAGE.to_string()),
            InlineImageSource::Avatar => Some(non_blank_or(avatar, DEFAULT_HAND_IMAGE)),
            InlineImageSource::Custom => Some(non_blank_or(&self.path, DEFAULT_HAND_IMAGE)),
        }
    }
}

impl Default for InlineMessageConfig {
    fn default() -> Self {
        Self {
            scope: Scope::Everyone,
            source: InlineImageSource::None,
            path: String::new(),
            width_percent: WidthPercent::new(85),
        }
    }
}

impl From<Value> for InlineMessageConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let path = value.get("path").or_else(|| value.get("overridePath"));
        let width = value
            .get("widthPercent")
            .or_else(|| value.get("widthPercentage"));
        Self {
            scope: lenient(value.get("scope").cloned(), d.scope),
            source: lenient(value.get("source").cloned(), d.source),
            path: lenient_string(path, &d.path),
            width_percent: WidthPercent::new(clamped_number(
                width,
                WidthPercent::MIN as i64,
                WidthPercent::MAX as i64,
                d.width_percent.percent() as i64,
            )),
        }
    }
}

/// Complete hand-raise configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct HandConfig {
    /// Raise control latches (toggle) instead of firing once (momentary)
    pub is_toggle: bool,
    /// Enabled delivery channels
    pub notification_modes: BTreeSet<NotificationMode>,
    pub indicator: IndicatorConfig,
    pub sound: HandSoundConfig,
    pub popout: PopoutConfig,
    pub banner: BannerConfig,
    pub inline_message: InlineMessageConfig,
}

impl HandConfig {
    pub fn is_enabled(&self, mode: NotificationMode) -> bool {
        self.notification_modes.contains(&mode)
    }

    /// Audience configured for a channel
    pub fn scope_for(&self, mode: NotificationMode) -> Scope {
        match mode {
            NotificationMode::Indicator => self.indicator.scope,
            NotificationMode::Sound => self.sound.scope,
            NotificationMode::Popout => self.popout.scope,
            NotificationMode::Banner => self.banner.scope,
            NotificationMode::InlineMessage => self.inline_message.scope,
        }
    }

    /// Lifetime for indicators created under this configuration
    pub fn indicator_mode(&self) -> IndicatorMode {
        if self.is_toggle {
            IndicatorMode::Persistent
        } else {
            IndicatorMode::Timed {
                hold_time_secs: self.indicator.hold_time_seconds.secs(),
            }
        }
    }

    /// The raise control is only offered when at least one channel is enabled
    pub fn has_any_mode(&self) -> bool {
        !self.notification_modes.is_empty()
    }
}

fn default_modes() -> BTreeSet<NotificationMode> {
    BTreeSet::from([NotificationMode::Indicator, NotificationMode::Sound])
}

fn parse_modes(value: Option<&Value>) -> BTreeSet<NotificationMode> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => default_modes(),
    }
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            is_toggle: true,
            notification_modes: default_modes(),
            indicator: IndicatorConfig::default(),
            sound: HandSoundConfig::default(),
            popout: PopoutConfig::default(),
            banner: BannerConfig::default(),
            inline_message: InlineMessageConfig::default(),
        }
    }
}

impl From<Value> for HandConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        // Also accept the nested `general` block and old section names
        let section = |name: &str, legacy: &str| {
            value
                .get(name)
                .or_else(|| value.get(legacy))
                .cloned()
                .unwrap_or(Value::Null)
        };
        let is_toggle = value
            .get("isToggle")
            .or_else(|| value.pointer("/general/isToggle"));
        let modes = value
            .get("notificationModes")
            .or_else(|| value.pointer("/general/notificationModes"));

        Self {
            is_toggle: lenient_bool(is_toggle, d.is_toggle),
            notification_modes: parse_modes(modes),
            indicator: section("indicator", "playerList").into(),
            sound: section("sound", "aural").into(),
            popout: section("popout", "popout").into(),
            banner: section("banner", "ui").into(),
            inline_message: section("inlineMessage", "chat").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = HandConfig::default();
        assert!(config.is_toggle);
        assert!(config.is_enabled(NotificationMode::Indicator));
        assert!(config.is_enabled(NotificationMode::Sound));
        assert!(!config.is_enabled(NotificationMode::Popout));
        assert_eq!(config.indicator.hold_time_seconds.secs(), 10);
        assert_eq!(config.sound.volume.percent(), 65);
        assert_eq!(config.inline_message.width_percent.percent(), 85);
        assert_eq!(config.inline_message.source, InlineImageSource::None);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config: HandConfig = serde_json::from_value(json!({
            "isToggle": "yes",
            "notificationModes": ["popout", "telepathy", "banner"],
            "indicator": { "scope": "admins", "holdTimeSeconds": 500 },
            "sound": { "source": "kazoo", "volume": 0 },
            "inlineMessage": { "widthPercent": "wide" }
        }))
        .unwrap();

        assert!(config.is_toggle);
        assert_eq!(
            config.notification_modes,
            BTreeSet::from([NotificationMode::Popout, NotificationMode::Banner])
        );
        assert_eq!(config.indicator.scope, Scope::Everyone);
        assert_eq!(config.indicator.hold_time_seconds.secs(), 60);
        assert_eq!(config.sound.source, HandSoundSource::Default);
        assert_eq!(config.sound.volume.percent(), 1);
        assert_eq!(config.inline_message.width_percent.percent(), 85);
    }

    #[test]
    fn test_non_object_yields_defaults() {
        let config: HandConfig = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(config, HandConfig::default());
    }

    #[test]
    fn test_accepts_nested_legacy_shape() {
        let config: HandConfig = serde_json::from_value(json!({
            "general": { "isToggle": false, "notificationModes": ["playerList", "chat"] },
            "playerList": { "scope": "gm-only", "holdTime": 3 },
            "aural": { "overridePath": "sounds/ding.ogg", "source": "custom", "soundVolume": 40 }
        }))
        .unwrap();

        assert!(!config.is_toggle);
        assert_eq!(
            config.notification_modes,
            BTreeSet::from([NotificationMode::Indicator, NotificationMode::InlineMessage])
        );
        assert_eq!(config.indicator.scope, Scope::PrivilegedOnly);
        assert_eq!(config.indicator.hold_time_seconds.secs(), 3);
        assert_eq!(config.sound.resolve_src(), "sounds/ding.ogg");
        assert_eq!(config.sound.volume.percent(), 40);
    }

    #[test]
    fn test_serialized_shape_reloads_identically() {
        let mut config = HandConfig::default();
        config.is_toggle = false;
        config.popout.source = PopoutImageSource::Avatar;
        config.banner.permanent = true;

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["isToggle"], json!(false));
        assert_eq!(value["inlineMessage"]["widthPercent"], json!(85));
        assert_eq!(value["notificationModes"], json!(["indicator", "sound"]));

        let reloaded: HandConfig = serde_json::from_value(value).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_indicator_mode_follows_toggle_flag() {
        let mut config = HandConfig::default();
        assert_eq!(config.indicator_mode(), IndicatorMode::Persistent);

        config.is_toggle = false;
        config.indicator.hold_time_seconds = HoldTime::new(7);
        assert_eq!(
            config.indicator_mode(),
            IndicatorMode::Timed { hold_time_secs: 7 }
        );
        assert_eq!(config.indicator_mode().hold(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_image_resolution() {
        let mut popout = PopoutConfig::default();
        assert_eq!(popout.resolve_image("avatars/a.png"), DEFAULT_HAND_IMAGE);

        popout.source = PopoutImageSource::Avatar;
        assert_eq!(popout.resolve_image("avatars/a.png"), "avatars/a.png");
        assert_eq!(popout.resolve_image(""), DEFAULT_HAND_IMAGE);

        popout.source = PopoutImageSource::Custom;
        popout.path = "img/custom.webp".to_string();
        assert_eq!(popout.resolve_image("avatars/a.png"), "img/custom.webp");

        let inline = InlineMessageConfig::default();
        assert_eq!(inline.resolve_image("avatars/a.png"), None);
    }
}
