//! Error types for the discovery client.
//!
//! The propagation policy is layered: transport and decode failures are
//! contained where they occur, and only construction-time failures (no
//! multicast socket could be bound) are fatal to the whole client.

use std::io;
use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during service discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No multicast socket could be bound. Fatal at `open`.
    #[error("failed to bind mDNS multicast socket: {0}")]
    Bind(#[source] io::Error),

    /// The client has already been closed; the operation cannot proceed.
    #[error("discovery client is closed")]
    Closed,

    /// A service type string that cannot name a DNS-SD service.
    #[error("invalid service type '{0}'")]
    InvalidServiceType(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error outside the bind path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
