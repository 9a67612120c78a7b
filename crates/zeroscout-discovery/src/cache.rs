//! TTL-based record cache, the ground truth for "what is currently known".
//!
//! Records are keyed by (owner name, type) with at most one entry per
//! (name, type, rdata) identity. Re-receiving an identical record refreshes
//! its TTL in place, preserving first-seen order; a ttl=0 record is a
//! goodbye and removes its identity immediately. Expired entries are purged
//! lazily on read and eagerly by the periodic sweep, which converge to the
//! same observable set within one sweep interval.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use zeroscout_dns::{RecordType, ResourceRecord};

/// Cache key: ASCII-case-insensitive owner name plus record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    name: String,
    rtype: RecordType,
}

impl RecordKey {
    fn new(name: &str, rtype: RecordType) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            rtype,
        }
    }
}

/// A record plus the instant it was last received.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    pub record: ResourceRecord,
    pub received_at: Instant,
}

impl CachedRecord {
    fn expires_at(&self) -> Instant {
        self.received_at + Duration::from_secs(u64::from(self.record.ttl))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Outcome of an upsert, consumed by the dispatch layer.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// New identity inserted. `flushed` carries same-(name,type) siblings
    /// superseded by the mDNS cache-flush bit.
    Added { flushed: Vec<ResourceRecord> },
    /// Known identity re-received; TTL reset, nothing else changed.
    Refreshed,
    /// ttl=0 goodbye for a known identity; the removed record is returned.
    Goodbye(ResourceRecord),
    /// ttl=0 for an identity that was never cached.
    Ignored,
}

#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<RecordKey, Vec<CachedRecord>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a record by its (name, type, rdata) identity.
    pub fn upsert(&mut self, record: ResourceRecord, now: Instant) -> UpsertOutcome {
        let key = RecordKey::new(&record.name, record.rtype());

        if record.ttl == 0 {
            let Some(slot) = self.entries.get_mut(&key) else {
                return UpsertOutcome::Ignored;
            };
            let Some(pos) = slot.iter().position(|c| c.record.data == record.data) else {
                return UpsertOutcome::Ignored;
            };
            let removed = slot.remove(pos);
            if slot.is_empty() {
                self.entries.remove(&key);
            }
            return UpsertOutcome::Goodbye(removed.record);
        }

        let slot = self.entries.entry(key).or_default();

        if let Some(existing) = slot.iter_mut().find(|c| c.record.data == record.data) {
            existing.record.ttl = record.ttl;
            existing.received_at = now;
            return UpsertOutcome::Refreshed;
        }

        let flushed = if record.cache_flush {
            // RFC 6762 §10.2: a cache-flush record supersedes earlier
            // records of the same name and type from other data.
            slot.drain(..).map(|c| c.record).collect()
        } else {
            Vec::new()
        };
        slot.push(CachedRecord {
            record,
            received_at: now,
        });
        UpsertOutcome::Added { flushed }
    }

    /// Returns the unexpired records for (name, type), purging expired
    /// entries on the way.
    pub fn get(&mut self, name: &str, rtype: RecordType, now: Instant) -> Vec<CachedRecord> {
        let key = RecordKey::new(name, rtype);
        let Some(slot) = self.entries.get_mut(&key) else {
            return Vec::new();
        };
        slot.retain(|c| !c.is_expired(now));
        if slot.is_empty() {
            self.entries.remove(&key);
            return Vec::new();
        }
        slot.clone()
    }

    /// Removes every record past its TTL boundary and returns them for
    /// removal dispatch.
    pub fn sweep(&mut self, now: Instant) -> Vec<ResourceRecord> {
        let mut expired = Vec::new();
        self.entries.retain(|_, slot| {
            slot.retain(|c| {
                if c.is_expired(now) {
                    expired.push(c.record.clone());
                    false
                } else {
                    true
                }
            });
            !slot.is_empty()
        });
        expired
    }

    /// Total number of live entries (expired-but-unswept included).
    pub fn record_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroscout_dns::RecordData;

    fn ptr(name: &str, target: &str, ttl: u32) -> ResourceRecord {
        ResourceRecord::new(name, ttl, RecordData::Ptr(target.to_string()))
    }

    #[test]
    fn one_entry_per_identity_last_ttl_wins() {
        let mut cache = RecordCache::new();
        let now = Instant::now();

        let record = ptr("_http._tcp.local.", "a._http._tcp.local.", 120);
        assert!(matches!(
            cache.upsert(record.clone(), now),
            UpsertOutcome::Added { .. }
        ));
        assert!(matches!(
            cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 4500), now),
            UpsertOutcome::Refreshed
        ));

        assert_eq!(cache.record_count(), 1);
        let records = cache.get("_http._tcp.local.", RecordType::Ptr, now);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.ttl, 4500);
    }

    #[test]
    fn distinct_rdata_coexists() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 120), now);
        cache.upsert(ptr("_http._tcp.local.", "b._http._tcp.local.", 120), now);
        assert_eq!(cache.get("_http._tcp.local.", RecordType::Ptr, now).len(), 2);
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(ptr("_HTTP._tcp.local.", "a._http._tcp.local.", 120), now);
        assert_eq!(cache.get("_http._TCP.local.", RecordType::Ptr, now).len(), 1);
    }

    #[test]
    fn goodbye_removes_before_any_read() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 4500), now);

        let outcome = cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 0), now);
        assert!(matches!(outcome, UpsertOutcome::Goodbye(_)));
        assert!(cache.get("_http._tcp.local.", RecordType::Ptr, now).is_empty());
        assert_eq!(cache.record_count(), 0);
    }

    #[test]
    fn goodbye_for_unknown_identity_is_ignored() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        let outcome = cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 0), now);
        assert!(matches!(outcome, UpsertOutcome::Ignored));
    }

    #[test]
    fn records_expire_at_ttl_boundary() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 60), now);

        let just_before = now + Duration::from_secs(59);
        assert_eq!(
            cache
                .get("_http._tcp.local.", RecordType::Ptr, just_before)
                .len(),
            1
        );

        let boundary = now + Duration::from_secs(60);
        assert!(cache
            .get("_http._tcp.local.", RecordType::Ptr, boundary)
            .is_empty());
    }

    #[test]
    fn sweep_returns_expired_records() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 10), now);
        cache.upsert(ptr("_http._tcp.local.", "b._http._tcp.local.", 120), now);

        let expired = cache.sweep(now + Duration::from_secs(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(
            expired[0].data,
            RecordData::Ptr("a._http._tcp.local.".to_string())
        );
        assert_eq!(cache.record_count(), 1);
    }

    #[test]
    fn refresh_extends_lifetime() {
        let mut cache = RecordCache::new();
        let start = Instant::now();
        cache.upsert(ptr("_http._tcp.local.", "a._http._tcp.local.", 60), start);

        // Re-announced at t+50 with the same TTL: alive at t+80.
        cache.upsert(
            ptr("_http._tcp.local.", "a._http._tcp.local.", 60),
            start + Duration::from_secs(50),
        );
        assert_eq!(
            cache
                .get(
                    "_http._tcp.local.",
                    RecordType::Ptr,
                    start + Duration::from_secs(80)
                )
                .len(),
            1
        );
    }

    #[test]
    fn cache_flush_supersedes_siblings() {
        let mut cache = RecordCache::new();
        let now = Instant::now();
        cache.upsert(
            ResourceRecord::new("host.local.", 120, RecordData::A("10.0.0.1".parse().unwrap())),
            now,
        );

        let outcome = cache.upsert(
            ResourceRecord::new("host.local.", 120, RecordData::A("10.0.0.2".parse().unwrap()))
                .with_cache_flush(),
            now,
        );
        let UpsertOutcome::Added { flushed } = outcome else {
            panic!("expected Added");
        };
        assert_eq!(flushed.len(), 1);

        let records = cache.get("host.local.", RecordType::A, now);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].record.data,
            RecordData::A("10.0.0.2".parse().unwrap())
        );
    }
}
