//! X-card (safety signal) settings

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    clamped_number, lenient, lenient_bool, lenient_string, non_blank_or, Scope, Volume,
    DEFAULT_XCARD_SOUND,
};

/// Where the X-card alarm comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XCardSoundSource {
    /// Silent X-card
    None,
    #[default]
    Default,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct XCardSoundConfig {
    pub source: XCardSoundSource,
    pub path: String,
    pub volume: Volume,
}

impl XCardSoundConfig {
    /// Sound file to play, or `None` when the alarm is silenced
    pub fn resolve_src(&self) -> Option<String> {
        match self.source {
            XCardSoundSource::None => None,
            XCardSoundSource::Default => Some(DEFAULT_XCARD_SOUND.to_string()),
            XCardSoundSource::Custom => Some(non_blank_or(&self.path, DEFAULT_XCARD_SOUND)),
        }
    }
}

impl Default for XCardSoundConfig {
    fn default() -> Self {
        Self {
            source: XCardSoundSource::Default,
            path: String::new(),
            volume: Volume::new(55),
        }
    }
}

impl From<Value> for XCardSoundConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let path = value.get("path").or_else(|| value.get("overridePath"));
        let volume = value.get("volume").or_else(|| value.get("soundVolume"));
        Self {
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

/// Complete X-card configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct XCardConfig {
    pub enabled: bool,
    pub scope: Scope,
    /// Hide the triggering participant's name
    pub anonymize: bool,
    pub sound: XCardSoundConfig,
}

impl From<Value> for XCardConfig {
    fn from(value: Value) -> Self {
        let d = Self::default();
        let enabled = value.get("enabled").or_else(|| value.get("isEnabled"));
        let anonymize = value
            .get("anonymize")
            .or_else(|| value.get("anonymousWarning"));
        Self {
            enabled: lenient_bool(enabled, d.enabled),
            scope: lenient(value.get("scope").cloned(), d.scope),
            anonymize: lenient_bool(anonymize, d.anonymize),
            // Older documents keep the sound fields at the top level
            sound: match value.get("sound") {
                Some(sound) => XCardSoundConfig::from(sound.clone()),
                None => XCardSoundConfig::from(value.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = XCardConfig::default();
        assert!(!config.enabled);
        assert!(!config.anonymize);
        assert_eq!(config.scope, Scope::Everyone);
        assert_eq!(config.sound.volume.percent(), 55);
        assert_eq!(
            config.sound.resolve_src().as_deref(),
            Some(DEFAULT_XCARD_SOUND)
        );
    }

    #[test]
    fn test_silenced_alarm() {
        let config: XCardConfig = serde_json::from_value(json!({
            "enabled": true,
            "sound": { "source": "none" }
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.sound.resolve_src(), None);
    }

    #[test]
    fn test_flat_document_shape() {
        let config: XCardConfig = serde_json::from_value(json!({
            "isEnabled": true,
            "anonymousWarning": true,
            "source": "none",
            "soundVolume": 30
        }))
        .unwrap();
        assert!(config.enabled);
        assert!(config.anonymize);
        assert_eq!(config.sound.source, XCardSoundSource::None);
        assert_eq!(config.sound.volume.percent(), 30);
    }

    #[test]
    fn test_lenient_fields() {
        let config: XCardConfig = serde_json::from_value(json!({
            "isEnabled": true,
            "scope": "gm-only",
            "anonymousWarning": 1,
            "sound": { "source": "custom", "path": "  ", "volume": 101.4 }
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.scope, Scope::PrivilegedOnly);
        assert!(!config.anonymize);
        assert_eq!(config.sound.volume.percent(), 100);
        assert_eq!(
            config.sound.resolve_src().as_deref(),
            Some(DEFAULT_XCARD_SOUND)
        );
    }
}
