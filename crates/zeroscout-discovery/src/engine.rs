//! The shared dispatch core: cache, browser registry and query schedule
//! behind one `Arc`.
//!
//! The engine is transport-free. The facade feeds it raw datagrams from
//! the receive tasks and drives its periodic tick; outbound queries leave
//! through a fire-and-forget channel drained by the transport's sender
//! task. Tests drive the engine directly with encoded packets.
//!
//! Locking: the cache sits behind a single mutex and every mutation goes
//! through it; browser dispatch runs on snapshots taken after the lock is
//! released, so listeners never observe partial updates.

use crate::browser::{BrowserHandle, BrowserInner, ServiceListener};
use crate::cache::{RecordCache, UpsertOutcome};
use crate::query::QuerySchedule;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};
use uuid::Uuid;
use zeroscout_core::{DiscoveryConfig, DiscoveryError, Result, ServiceInstance};
use zeroscout_dns::{
    decode, query, Question, QuestionType, RecordClass, RecordData, RecordType, ResourceRecord,
};

/// Meta-type whose PTR records enumerate every advertised service type
/// (RFC 6763 §9).
pub const META_QUERY_TYPE: &str = "_services._dns-sd._udp.local.";

pub struct Engine {
    config: DiscoveryConfig,
    cache: Mutex<RecordCache>,
    browsers: DashMap<Uuid, Arc<BrowserInner>>,
    schedule: Mutex<QuerySchedule>,
    /// Woken on every batch of cache changes; `collect_types` waits here.
    change_notify: Notify,
    query_tx: UnboundedSender<Vec<u8>>,
}

impl Engine {
    /// Creates an engine that emits encoded queries into `query_tx`.
    pub fn new(config: DiscoveryConfig, query_tx: UnboundedSender<Vec<u8>>) -> Arc<Self> {
        let schedule = QuerySchedule::new(
            config.initial_query_interval(),
            config.max_query_interval(),
        );
        Arc::new(Self {
            config,
            cache: Mutex::new(RecordCache::new()),
            browsers: DashMap::new(),
            schedule: Mutex::new(schedule),
            change_notify: Notify::new(),
            query_tx,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Decodes one datagram and applies its records. Malformed packets are
    /// dropped here; the receive loop never sees them fail.
    pub fn handle_datagram(&self, data: &[u8], now: Instant) {
        let message = match decode(data) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, len = data.len(), "dropping malformed packet");
                return;
            }
        };
        if !message.is_response {
            trace!("ignoring query packet");
            return;
        }
        self.apply_records(message.records, now);
    }

    /// Applies decoded records to the cache and dispatches the resulting
    /// changes to browsers and enumeration waiters.
    pub fn apply_records(&self, records: Vec<ResourceRecord>, now: Instant) {
        let mut touched = Vec::new();
        {
            let mut cache = self.cache.lock();
            for record in records {
                if record.class != RecordClass::In {
                    continue;
                }
                match cache.upsert(record.clone(), now) {
                    UpsertOutcome::Added { flushed } => {
                        touched.push(record);
                        touched.extend(flushed);
                    }
                    UpsertOutcome::Goodbye(removed) => touched.push(removed),
                    UpsertOutcome::Refreshed | UpsertOutcome::Ignored => {}
                }
            }
        }
        self.after_changes(touched, now, true);
    }

    /// Periodic driver: expiry sweep plus due re-queries.
    pub fn tick(&self, now: Instant) {
        let expired = self.cache.lock().sweep(now);
        // Expiry changes the observable set but is not an answer, so it
        // does not reset any backoff.
        self.after_changes(expired, now, false);

        let due = self.schedule.lock().due(now);
        for service_type in due {
            self.send_query(&service_type);
        }
    }

    fn after_changes(&self, touched: Vec<ResourceRecord>, now: Instant, reset_backoff: bool) {
        if touched.is_empty() {
            return;
        }

        let mut types = HashSet::new();
        let mut address_change = false;
        for record in &touched {
            match record.rtype() {
                RecordType::A | RecordType::Aaaa => address_change = true,
                _ => {}
            }
            if let Some(service_type) = affected_type(record) {
                types.insert(service_type);
            }
        }

        if reset_backoff && !types.is_empty() {
            let mut schedule = self.schedule.lock();
            for service_type in &types {
                schedule.reset(service_type, now);
            }
        }

        self.change_notify.notify_waiters();

        // Collected first: a listener may stop its browser mid-callback,
        // which mutates the registry.
        let browsers: Vec<Arc<BrowserInner>> = self
            .browsers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for browser in browsers {
            if address_change || types.contains(&browser.type_key) {
                self.refresh_browser(&browser, now);
            }
        }
    }

    /// Validates and starts a new browser for `service_type`.
    pub fn browse(
        self: &Arc<Self>,
        service_type: &str,
        listener: Arc<dyn ServiceListener>,
    ) -> Result<BrowserHandle> {
        let service_type = normalize_service_type(service_type)?;
        let browser = BrowserInner::new(service_type, listener);
        browser.start();
        self.register_browser(Arc::clone(&browser), Instant::now());
        debug!(service_type = %browser.service_type, "browser started");
        Ok(BrowserHandle::new(browser, Arc::clone(self)))
    }

    fn register_browser(&self, browser: Arc<BrowserInner>, now: Instant) {
        self.browsers.insert(browser.id, Arc::clone(&browser));
        let first = self.schedule.lock().register(&browser.service_type, now);
        if first {
            self.send_query(&browser.service_type);
        }
        // Seed from whatever the cache already knows.
        self.refresh_browser(&browser, now);
    }

    pub(crate) fn deregister_browser(&self, browser: &BrowserInner) {
        self.browsers.remove(&browser.id);
        self.schedule.lock().deregister(&browser.service_type);
    }

    /// Stops every browser; used by the facade's close path.
    pub fn stop_all_browsers(&self) {
        let browsers: Vec<Arc<BrowserInner>> = self
            .browsers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for browser in browsers {
            if browser.stop() {
                self.schedule.lock().deregister(&browser.service_type);
            }
        }
        self.browsers.clear();
    }

    fn refresh_browser(&self, browser: &BrowserInner, now: Instant) {
        let snapshot = {
            let mut cache = self.cache.lock();
            build_type_snapshot(&mut cache, &browser.service_type, now)
        };
        browser.apply_snapshot(snapshot);
    }

    /// Encodes and queues a PTR question. Fire-and-forget: responses only
    /// ever arrive through the cache.
    pub fn send_query(&self, service_type: &str) {
        // Multicast queries carry id 0 (RFC 6762 §18.1).
        match query(0, &[Question::new(service_type, QuestionType::Ptr)]) {
            Ok(packet) => {
                if self.query_tx.send(packet).is_err() {
                    debug!("query channel closed");
                }
            }
            Err(e) => warn!(error = %e, service_type, "could not encode query"),
        }
    }

    /// One-shot service-type enumeration: queries the meta-type and
    /// collects PTR targets until the deadline, waking on cache changes
    /// rather than polling. Always returns at or before the deadline with
    /// whatever was observed (possibly nothing).
    pub async fn collect_types(&self, timeout: Duration) -> HashSet<String> {
        let now = Instant::now();
        let first = self.schedule.lock().register(META_QUERY_TYPE, now);
        if first {
            self.send_query(META_QUERY_TYPE);
        }

        let mut found = HashSet::new();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.collect_types_into(&mut found);
            match tokio::time::timeout_at(deadline, self.change_notify.notified()).await {
                Ok(()) => continue,
                Err(_) => break,
            }
        }
        self.collect_types_into(&mut found);

        self.schedule.lock().deregister(META_QUERY_TYPE);
        found
    }

    fn collect_types_into(&self, found: &mut HashSet<String>) {
        let mut cache = self.cache.lock();
        for cached in cache.get(META_QUERY_TYPE, RecordType::Ptr, Instant::now()) {
            if let RecordData::Ptr(service_type) = cached.record.data {
                found.insert(service_type);
            }
        }
    }
}

/// Maps a changed record to the service type it affects, if that can be
/// derived from its name: a PTR's owner name is the type itself, and an
/// SRV/TXT owner is an instance name whose tail is the type. Address
/// records carry no type information and trigger a broad refresh instead.
fn affected_type(record: &ResourceRecord) -> Option<String> {
    match record.rtype() {
        RecordType::Ptr => Some(record.name.to_ascii_lowercase()),
        RecordType::Srv | RecordType::Txt => record
            .name
            .split_once('.')
            .map(|(_, tail)| tail.to_ascii_lowercase()),
        _ => None,
    }
}

fn normalize_service_type(service_type: &str) -> Result<String> {
    let trimmed = service_type.trim();
    if trimmed.is_empty()
        || trimmed.contains(char::is_whitespace)
        || !trimmed.starts_with('_')
        || !trimmed.contains('.')
    {
        return Err(DiscoveryError::InvalidServiceType(service_type.to_string()));
    }
    if trimmed.ends_with('.') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}.", trimmed))
    }
}

/// Builds the current view of one service type: every live PTR target,
/// resolved where an SRV and at least one address are known.
fn build_type_snapshot(
    cache: &mut RecordCache,
    service_type: &str,
    now: Instant,
) -> HashMap<String, Option<ServiceInstance>> {
    let mut snapshot = HashMap::new();
    for cached in cache.get(service_type, RecordType::Ptr, now) {
        let RecordData::Ptr(instance_name) = cached.record.data else {
            continue;
        };
        let key = instance_name.to_ascii_lowercase();
        if snapshot.contains_key(&key) {
            continue;
        }
        let resolved = resolve_instance(cache, service_type, &instance_name, now);
        snapshot.insert(key, resolved);
    }
    snapshot
}

fn resolve_instance(
    cache: &mut RecordCache,
    service_type: &str,
    instance_name: &str,
    now: Instant,
) -> Option<ServiceInstance> {
    // Newest SRV wins if the instance moved host or port.
    let srvs = cache.get(instance_name, RecordType::Srv, now);
    let srv = srvs.iter().max_by_key(|c| c.received_at)?;
    let RecordData::Srv { port, target, .. } = &srv.record.data else {
        return None;
    };

    let mut addresses: Vec<IpAddr> = Vec::new();
    for cached in cache.get(target, RecordType::A, now) {
        if let RecordData::A(addr) = cached.record.data {
            addresses.push(IpAddr::V4(addr));
        }
    }
    for cached in cache.get(target, RecordType::Aaaa, now) {
        if let RecordData::Aaaa(addr) = cached.record.data {
            addresses.push(IpAddr::V6(addr));
        }
    }
    if addresses.is_empty() {
        // PTR+SRV but no address yet: tracked, not emitted.
        return None;
    }

    let mut properties = HashMap::new();
    let txts = cache.get(instance_name, RecordType::Txt, now);
    if let Some(txt) = txts.iter().max_by_key(|c| c.received_at) {
        if let RecordData::Txt(strings) = &txt.record.data {
            for entry in strings {
                if entry.is_empty() {
                    continue;
                }
                match entry.split_once('=') {
                    Some((key, value)) => {
                        properties.insert(key.to_string(), value.to_string());
                    }
                    // A bare key is a boolean flag.
                    None => {
                        properties.insert(entry.clone(), String::new());
                    }
                }
            }
        }
    }

    Some(ServiceInstance::new(
        instance_name.to_string(),
        service_type.to_string(),
        target.clone(),
        *port,
        addresses,
        properties,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_normalization() {
        assert_eq!(
            normalize_service_type("_http._tcp.local").unwrap(),
            "_http._tcp.local."
        );
        assert_eq!(
            normalize_service_type("_http._tcp.local.").unwrap(),
            "_http._tcp.local."
        );
        assert!(normalize_service_type("").is_err());
        assert!(normalize_service_type("http._tcp.local.").is_err());
        assert!(normalize_service_type("_http _tcp").is_err());
        assert!(normalize_service_type("_plain").is_err());
    }

    #[test]
    fn affected_type_derivation() {
        let ptr = ResourceRecord::new(
            "_HTTP._tcp.local.",
            120,
            RecordData::Ptr("a._http._tcp.local.".to_string()),
        );
        assert_eq!(affected_type(&ptr), Some("_http._tcp.local.".to_string()));

        let srv = ResourceRecord::new(
            "Web Server._http._tcp.local.",
            120,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 80,
                target: "host.local.".to_string(),
            },
        );
        assert_eq!(affected_type(&srv), Some("_http._tcp.local.".to_string()));

        let a = ResourceRecord::new("host.local.", 120, RecordData::A("10.0.0.1".parse().unwrap()));
        assert_eq!(affected_type(&a), None);
    }
}
