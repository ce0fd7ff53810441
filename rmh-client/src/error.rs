//! Error types for rmh-client
//!
//! Throttling, missing identity and stale targets are outcomes, not errors;
//! see [`crate::outcome::SignalOutcome`]. These variants cover failures inside a
//! single channel handler or at the process boundary.

use thiserror::Error;

/// Main error type for the client crate
#[derive(Error, Debug)]
pub enum Error {
    /// Settings, store or serialization failure from the common crate
    #[error(transparent)]
    Common(#[from] rmh_common::Error),

    /// Sound playback or stop failed
    #[error("Audio error: {0}")]
    Audio(String),

    /// Popout could not be rendered or closed
    #[error("Overlay error: {0}")]
    Overlay(String),

    /// Remote dispatch failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Simulator configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
