//! The resolved view of an advertised service instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// A service instance discovered on the network.
///
/// Joins the PTR (type to instance), SRV (instance to host:port), TXT
/// (metadata) and A/AAAA (host to addresses) records announced for one
/// instance name. An instance only reaches consumers once it is resolved,
/// meaning its SRV target and at least one address are known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Fully qualified instance name (e.g. "Web Server._http._tcp.local.").
    pub instance_name: String,

    /// Service type this instance belongs to (e.g. "_http._tcp.local.").
    pub service_type: String,

    /// Target hostname from the SRV record (e.g. "host.local.").
    pub hostname: String,

    /// Service port from the SRV record.
    pub port: u16,

    /// Addresses of the target host (can be multiple for dual-stack).
    pub addresses: Vec<IpAddr>,

    /// TXT record properties (key/value metadata; a bare key maps to "").
    pub properties: HashMap<String, String>,

    /// First resolved timestamp.
    pub discovered_at: DateTime<Utc>,

    /// Last time any record of this instance was refreshed.
    pub last_seen_at: DateTime<Utc>,
}

impl ServiceInstance {
    /// Creates a freshly resolved instance.
    pub fn new(
        instance_name: String,
        service_type: String,
        hostname: String,
        port: u16,
        mut addresses: Vec<IpAddr>,
        properties: HashMap<String, String>,
    ) -> Self {
        // Deterministic order so snapshots of the same data compare equal.
        addresses.sort();
        addresses.dedup();
        let now = Utc::now();
        Self {
            instance_name,
            service_type,
            hostname,
            port,
            addresses,
            properties,
            discovered_at: now,
            last_seen_at: now,
        }
    }

    /// The human-readable part of the instance name, with the service-type
    /// suffix stripped (e.g. "Web Server").
    pub fn short_name(&self) -> &str {
        let name = self.instance_name.trim_end_matches('.');
        let suffix = self.service_type.trim_end_matches('.');
        match name.strip_suffix(suffix) {
            Some(prefix) => prefix.trim_end_matches('.'),
            None => name,
        }
    }

    /// Returns the primary address, preferring IPv4.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| self.addresses.first())
            .copied()
    }

    /// Returns the connection string (host:port).
    pub fn connection_string(&self) -> String {
        match self.primary_address() {
            Some(IpAddr::V6(addr)) => format!("[{}]:{}", addr, self.port),
            Some(addr) => format!("{}:{}", addr, self.port),
            None => format!("{}:{}", self.hostname, self.port),
        }
    }

    /// Updates the last-seen timestamp.
    pub fn mark_seen(&mut self) {
        self.last_seen_at = Utc::now();
    }

    /// Whether two snapshots carry the same advertised data, ignoring
    /// timestamps. Drives update notifications.
    pub fn same_endpoint(&self, other: &ServiceInstance) -> bool {
        self.hostname == other.hostname
            && self.port == other.port
            && self.addresses == other.addresses
            && self.properties == other.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn instance() -> ServiceInstance {
        ServiceInstance::new(
            "Web Server._http._tcp.local.".to_string(),
            "_http._tcp.local.".to_string(),
            "host.local.".to_string(),
            80,
            vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))],
            HashMap::new(),
        )
    }

    #[test]
    fn short_name_strips_type_suffix() {
        assert_eq!(instance().short_name(), "Web Server");
    }

    #[test]
    fn short_name_falls_back_to_full_name() {
        let mut inst = instance();
        inst.instance_name = "odd-name.local.".to_string();
        assert_eq!(inst.short_name(), "odd-name.local");
    }

    #[test]
    fn connection_string_prefers_ipv4() {
        let mut inst = instance();
        inst.addresses.push("fe80::1".parse().unwrap());
        inst.addresses.sort();
        assert_eq!(inst.connection_string(), "192.168.1.10:80");
    }

    #[test]
    fn connection_string_brackets_ipv6() {
        let mut inst = instance();
        inst.addresses = vec!["fe80::1".parse().unwrap()];
        assert_eq!(inst.connection_string(), "[fe80::1]:80");
    }

    #[test]
    fn same_endpoint_ignores_timestamps() {
        let a = instance();
        let mut b = instance();
        b.discovered_at = b.discovered_at - chrono::Duration::seconds(60);
        assert!(a.same_endpoint(&b));

        b.port = 8080;
        assert!(!a.same_endpoint(&b));
    }
}
