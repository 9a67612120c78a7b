//! # zeroscout-core
//!
//! Core types, error handling, and configuration for the zeroscout
//! mDNS/DNS-SD service-discovery client.
//!
//! This crate provides the foundational building blocks shared by the
//! discovery engine and its consumers:
//!
//! - **Errors**: the `DiscoveryError` taxonomy using `thiserror`. Only
//!   construction-time failures (socket bind) are fatal to the client;
//!   everything else is contained at its layer.
//! - **Configuration**: `DiscoveryConfig` with serde support, per-field
//!   defaults and validation.
//! - **Instances**: `ServiceInstance`, the resolved view of an advertised
//!   service (instance name, host, port, addresses, TXT metadata).

pub mod config;
pub mod error;
pub mod instance;

// Re-export commonly used types for convenience
pub use config::{DiscoveryConfig, IpVersion};
pub use error::{DiscoveryError, Result};
pub use instance::ServiceInstance;
