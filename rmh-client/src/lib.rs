//! # Raise-hand session client (rmh-client)
//!
//! Per-client notification dispatch for hand raises and X-cards.
//!
//! **Purpose:** Decide who receives which signal through which channel,
//! enforce the per-client debounce window, and keep transient UI state
//! (indicators, popouts, sounds) consistent on every connected client.
//!
//! **Architecture:** Orchestrators send [`rmh_common::SignalMessage`]s through
//! a [`dispatch::Dispatcher`]; each client's listener feeds its inbox into a
//! [`router::MessageRouter`] one message at a time.

pub mod client;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod hand;
pub mod hub;
pub mod indicator;
pub mod outcome;
pub mod popout;
pub mod router;
pub mod sound;
pub mod state;
pub mod xcard;

pub use client::{SessionClient, SessionClientBuilder};
pub use dispatch::{Dispatcher, RemoteTransport};
pub use error::{Error, Result};
pub use hand::HandOrchestrator;
pub use hub::LocalHub;
pub use outcome::{DispatchReport, SignalOutcome};
pub use state::ClientState;
pub use xcard::SafetyOrchestrator;
