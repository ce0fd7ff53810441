//! Session settings data model
//!
//! Replicated per-session configuration for the hand-raise and X-card signals.
//!
//! Every value is validated at construction: numbers are clamped to their
//! ranges, and a field that is missing, of the wrong type, or holds an unknown
//! choice falls back to that field's default. Deserialization never fails for
//! a JSON object, so a stored configuration can never be left malformed.
//!
//! Legacy spellings (`all-players`/`gm-only`, `playerList`, `aural`, `ui`,
//! `chat`, `overridePath`) are accepted on input and normalized on output.

mod hand;
mod xcard;

pub use hand::{
    BannerConfig, HandConfig, HandSoundConfig, HandSoundSource, IndicatorConfig, IndicatorMode,
    InlineImageSource, InlineMessageConfig, NotificationMode, PopoutConfig, PopoutImageSource,
};
pub use xcard::{XCardConfig, XCardSoundConfig, XCardSoundSource};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Default hand image shown in popouts and inline messages
pub const DEFAULT_HAND_IMAGE: &str = "assets/ui/hand.svg";

/// Default hand-raise chime
pub const DEFAULT_HAND_SOUND: &str = "assets/sounds/bell01.ogg";

/// Image shown in the X-card popout
pub const DEFAULT_XCARD_IMAGE: &str = "assets/ui/xcard.svg";

/// Default X-card alarm
pub const DEFAULT_XCARD_SOUND: &str = "assets/sounds/alarm.ogg";

/// Default minimum interval between two signals from one client (seconds)
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u32 = 10;

/// Upper bound for the notification timeout (seconds)
pub const MAX_NOTIFICATION_TIMEOUT_SECS: u32 = 60;

/// Clamp a raw notification timeout into `[0, 60]` seconds
pub fn clamp_notification_timeout(seconds: i64) -> u32 {
    seconds.clamp(0, MAX_NOTIFICATION_TIMEOUT_SECS as i64) as u32
}

/// Audience selector for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Every connected participant, including the initiator
    #[default]
    #[serde(rename = "everyone", alias = "all-players")]
    Everyone,

    /// Privileged participants only (the initiator still sees their own signal)
    #[serde(rename = "privileged-only", alias = "gm-only")]
    PrivilegedOnly,
}

/// Playback volume as a percentage in `[1, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Volume(u8);

impl Volume {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Build a volume, clamping into `[1, 100]`
    pub fn new(percent: i64) -> Self {
        Self(percent.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Linear gain in `(0.0, 1.0]`
    pub fn gain(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Serialize for Volume {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self::new(raw.round() as i64))
    }
}

/// Seconds a momentary indicator lingers, in `[0, 60]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoldTime(u32);

impl HoldTime {
    pub const MAX_SECS: u32 = 60;

    /// Build a hold time, clamping into `[0, 60]`
    pub fn new(secs: i64) -> Self {
        Self(secs.clamp(0, Self::MAX_SECS as i64) as u32)
    }

    pub fn secs(self) -> u32 {
        self.0
    }
}

impl Serialize for HoldTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for HoldTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self::new(raw.round() as i64))
    }
}

/// Inline image width as a percentage of the message, in `[1, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidthPercent(u8);

impl WidthPercent {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    pub fn new(percent: i64) -> Self {
        Self(percent.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl fmt::Display for WidthPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for WidthPercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for WidthPercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self::new(raw.round() as i64))
    }
}

/// Parse an optional JSON value, falling back to `default` when it is
/// absent, null, or not convertible.
pub(crate) fn lenient<T: DeserializeOwned>(value: Option<Value>, default: T) -> T {
    match value {
        None | Some(Value::Null) => default,
        Some(v) => serde_json::from_value(v).unwrap_or(default),
    }
}

/// Parse an optional JSON number and clamp it into `[min, max]`.
/// Non-numeric input yields `default`.
pub(crate) fn clamped_number(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
    match value.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => (n.round() as i64).clamp(min, max),
        _ => default,
    }
}

/// Parse an optional string, falling back to `default` for anything else
pub(crate) fn lenient_string(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// Parse an optional bool, falling back to `default` for anything else
pub(crate) fn lenient_bool(value: Option<&Value>, default: bool) -> bool {
    value.and_then(Value::as_bool).unwrap_or(default)
}

/// Pick a custom path if it is non-blank, otherwise the fallback
pub(crate) fn non_blank_or(path: &str, fallback: &str) -> String {
    if path.trim().is_empty() {
        fallback.to_string()
    } else {
        path.to_string()
    }
}
