//! mDNS/DNS-SD service discovery client.
//!
//! This crate browses a local network for instances of a named service
//! type, maintains a TTL-accurate cache of announced records, and invokes
//! listener callbacks as instances appear, change or disappear. A one-shot
//! meta-query enumerates every advertised service type.
//!
//! # Architecture
//!
//! - [`transport`]: multicast sockets and the receive/send tasks.
//! - [`cache`]: the record cache, ground truth for "currently known".
//! - [`query`]: re-query pacing with exponential backoff.
//! - [`browser`]: per-type subscriptions and listener dispatch.
//! - [`engine`]: the transport-free core joining the above; tests and
//!   embedders can drive it directly with encoded packets.
//! - [`Zeroconf`]: the facade owning the whole lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zeroscout_core::{DiscoveryConfig, ServiceInstance};
//! use zeroscout_discovery::{ServiceListener, Zeroconf};
//!
//! struct PrintListener;
//!
//! impl ServiceListener for PrintListener {
//!     fn on_service_added(&self, instance: &ServiceInstance) {
//!         println!("found {} at {}", instance.short_name(), instance.connection_string());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> zeroscout_core::Result<()> {
//!     let client = Zeroconf::open(DiscoveryConfig::default()).await?;
//!     let browser = client.browse("_http._tcp.local.", Arc::new(PrintListener))?;
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     browser.stop();
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cache;
pub mod engine;
pub mod query;
pub mod transport;
pub mod zeroconf;

pub use browser::{BrowserHandle, ServiceListener};
pub use engine::{Engine, META_QUERY_TYPE};
pub use zeroconf::Zeroconf;

// Re-exported so consumers need only this crate for the common path.
pub use zeroscout_core::{DiscoveryConfig, DiscoveryError, IpVersion, Result, ServiceInstance};
