//! Configuration types for the discovery client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which IP families the client binds and joins.
///
/// Fixed at construction; changing it requires reopening the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpVersion {
    /// IPv4 only (224.0.0.251).
    V4Only,
    /// IPv6 only (ff02::fb).
    V6Only,
    /// Both families, each bound best-effort.
    All,
}

impl Default for IpVersion {
    fn default() -> Self {
        IpVersion::All
    }
}

/// Configuration for the discovery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// IP families to listen on.
    #[serde(default)]
    pub ip_version: IpVersion,

    /// Default deadline for one-shot operations such as service-type
    /// enumeration (milliseconds).
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Interval of the periodic expiry sweep / re-query tick (milliseconds).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Initial re-query interval for a browsed service type (seconds).
    #[serde(default = "default_initial_query_interval")]
    pub initial_query_interval_secs: u64,

    /// Cap on the exponential re-query backoff (seconds).
    #[serde(default = "default_max_query_interval")]
    pub max_query_interval_secs: u64,

    /// Requested socket receive buffer size (bytes, best-effort).
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ip_version: IpVersion::default(),
            query_timeout_ms: default_query_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            initial_query_interval_secs: default_initial_query_interval(),
            max_query_interval_secs: default_max_query_interval(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the one-shot query deadline as a Duration.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Returns the sweep tick as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Returns the initial re-query interval as a Duration.
    pub fn initial_query_interval(&self) -> Duration {
        Duration::from_secs(self.initial_query_interval_secs)
    }

    /// Returns the backoff cap as a Duration.
    pub fn max_query_interval(&self) -> Duration {
        Duration::from_secs(self.max_query_interval_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.query_timeout_ms == 0 {
            return Err("query_timeout_ms cannot be 0".to_string());
        }

        if self.sweep_interval_ms == 0 {
            return Err("sweep_interval_ms cannot be 0".to_string());
        }

        if self.initial_query_interval_secs == 0 {
            return Err("initial_query_interval_secs cannot be 0".to_string());
        }

        if self.max_query_interval_secs < self.initial_query_interval_secs {
            return Err(
                "max_query_interval_secs cannot be below initial_query_interval_secs".to_string(),
            );
        }

        Ok(())
    }
}

// Default configuration values
fn default_query_timeout_ms() -> u64 {
    3000
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

fn default_initial_query_interval() -> u64 {
    1
}

fn default_max_query_interval() -> u64 {
    60
}

fn default_recv_buffer_size() -> usize {
    65536
}
