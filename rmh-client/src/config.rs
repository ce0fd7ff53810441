//! Simulator configuration for the `rmh-session` binary
//!
//! Resolution order for the config file:
//! 1. Command-line argument
//! 2. `RMH_CONFIG` environment variable
//! 3. `<config dir>/rmh/config.toml`
//! 4. Compiled defaults
//!
//! A missing file falls back to the defaults; a malformed one is an error.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rmh_common::UserInfo;

use crate::client::DEFAULT_EVENT_CAPACITY;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RMH_CONFIG";

/// One simulated participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub privileged: bool,
}

impl ParticipantConfig {
    pub fn to_user_info(&self) -> UserInfo {
        let user = UserInfo::new(self.id.as_str(), self.name.as_str()).with_avatar(&self.avatar);
        if self.privileged {
            user.privileged()
        } else {
            user
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// SQLite database file; the in-memory store is used when absent
    pub database: Option<PathBuf>,
    /// Event bus capacity per client
    pub event_capacity: usize,
    pub participants: Vec<ParticipantConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            database: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            participants: vec![
                ParticipantConfig {
                    id: "gm".to_string(),
                    name: "Game Master".to_string(),
                    avatar: "avatars/gm.png".to_string(),
                    privileged: true,
                },
                ParticipantConfig {
                    id: "alice".to_string(),
                    name: "Alice".to_string(),
                    avatar: "avatars/alice.png".to_string(),
                    privileged: false,
                },
                ParticipantConfig {
                    id: "bob".to_string(),
                    name: "Bob".to_string(),
                    avatar: String::new(),
                    privileged: false,
                },
            ],
        }
    }
}

impl SimulatorConfig {
    /// Resolve the config file and load it
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => Self::from_file(&path),
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`, using defaults if the file does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        info!(path = %path.display(), participants = config.participants.len(), "Loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(Error::Config("At least one participant is required".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for participant in &self.participants {
            if participant.id.trim().is_empty() {
                return Err(Error::Config("Participant id must not be empty".to_string()));
            }
            if !seen.insert(participant.id.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate participant id: {}",
                    participant.id
                )));
            }
        }
        Ok(())
    }
}

/// Pick the config file path by priority
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: user config directory
    default_config_path()
}

/// Platform config file location (`~/.config/rmh/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rmh").join("config.toml"))
}
