//! # Raise-hand common library
//!
//! Shared code for the session clients including:
//! - Settings data model (hand raise and X-card)
//! - Legacy settings migration
//! - Participant identity types
//! - Wire messages exchanged between clients
//! - Client event types (ClientEvent enum) and EventBus
//! - Configuration store (in-memory and SQLite)
//! - Indicator animation timing

pub mod error;
pub mod events;
pub mod identity;
pub mod message;
pub mod migration;
pub mod settings;
pub mod store;
pub mod timing;

pub use error::{Error, Result};
pub use identity::{IdentityRegistry, SessionRoster, UserId, UserInfo};
pub use message::{SignalMessage, SoundRequest};
pub use settings::{HandConfig, Scope, Volume, XCardConfig};
pub use store::{ConfigChange, ConfigStore};
