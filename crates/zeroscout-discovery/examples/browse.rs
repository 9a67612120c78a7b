//! Browse for HTTP services and report what comes and goes.
//!
//! Run with: cargo run --example browse

use std::sync::Arc;
use std::time::Duration;
use zeroscout_core::{DiscoveryConfig, ServiceInstance};
use zeroscout_discovery::{ServiceListener, Zeroconf};

struct Reporter;

impl ServiceListener for Reporter {
    fn on_service_added(&self, instance: &ServiceInstance) {
        println!(
            "added   {} -> {}",
            instance.short_name(),
            instance.connection_string()
        );
    }

    fn on_service_updated(&self, instance: &ServiceInstance) {
        println!(
            "updated {} -> {}",
            instance.short_name(),
            instance.connection_string()
        );
    }

    fn on_service_removed(&self, instance: &ServiceInstance) {
        println!("removed {}", instance.short_name());
    }
}

#[tokio::main]
async fn main() -> zeroscout_core::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Zeroconf::open(DiscoveryConfig::default()).await?;

    let types = client.enumerate_types(Duration::from_secs(1)).await?;
    println!("service types on this network: {:?}", types);

    let browser = client.browse("_http._tcp.local.", Arc::new(Reporter))?;
    tokio::time::sleep(Duration::from_secs(10)).await;
    browser.stop();

    client.close();
    Ok(())
}
