//! zeroscout - CLI front end for the mDNS/DNS-SD discovery client
//!
//! Browse for instances of a service type or enumerate every service type
//! advertised on the local network. Pure process wrapping: all discovery
//! logic lives in the library crates.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use zeroscout_core::{DiscoveryConfig, IpVersion, ServiceInstance};
use zeroscout_discovery::{ServiceListener, Zeroconf};

/// Discover services on the local network via mDNS/DNS-SD
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP families to listen on
    #[arg(long, value_enum, default_value = "all")]
    ip: IpFamily,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum IpFamily {
    V4,
    V6,
    All,
}

impl From<IpFamily> for IpVersion {
    fn from(family: IpFamily) -> Self {
        match family {
            IpFamily::V4 => IpVersion::V4Only,
            IpFamily::V6 => IpVersion::V6Only,
            IpFamily::All => IpVersion::All,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse for instances of a service type until interrupted
    Browse {
        /// Service type, e.g. "_http._tcp.local."
        service_type: String,
    },
    /// Enumerate every advertised service type
    Enumerate {
        /// How long to collect answers, in seconds
        #[arg(long, default_value = "3")]
        timeout: u64,
    },
}

struct PrintListener;

impl ServiceListener for PrintListener {
    fn on_service_added(&self, instance: &ServiceInstance) {
        println!(
            "+ {} at {} {:?}",
            instance.short_name(),
            instance.connection_string(),
            instance.properties
        );
    }

    fn on_service_updated(&self, instance: &ServiceInstance) {
        println!(
            "~ {} at {} {:?}",
            instance.short_name(),
            instance.connection_string(),
            instance.properties
        );
    }

    fn on_service_removed(&self, instance: &ServiceInstance) {
        println!("- {}", instance.short_name());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("zeroscout=info")),
        )
        .init();

    let args = Args::parse();

    let config = DiscoveryConfig {
        ip_version: args.ip.into(),
        ..Default::default()
    };
    let client = Zeroconf::open(config).await?;

    match args.command {
        Command::Browse { service_type } => {
            let browser = client.browse(&service_type, Arc::new(PrintListener))?;
            info!(service_type = browser.service_type(), "browsing, ctrl-c to stop");
            signal::ctrl_c().await?;
            browser.stop();
        }
        Command::Enumerate { timeout } => {
            let types = client.enumerate_types(Duration::from_secs(timeout)).await?;
            if types.is_empty() {
                println!("no service types observed");
            } else {
                let mut sorted: Vec<_> = types.into_iter().collect();
                sorted.sort();
                for service_type in sorted {
                    println!("{}", service_type);
                }
            }
        }
    }

    client.close();
    Ok(())
}
