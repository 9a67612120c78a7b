//! Service browsers: per-type subscriptions delivering add/update/remove
//! callbacks to registered listeners.
//!
//! A browser moves Created → Running → Stopped; Stopped is terminal. While
//! Running it diffs each post-mutation cache snapshot against what it has
//! already emitted. Instances with a PTR and SRV but no resolvable address
//! are tracked internally and never surface until resolved. Listener code
//! runs synchronously on the dispatch path; a panicking listener is caught
//! at the boundary and reported, never propagated.

use crate::engine::Engine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;
use zeroscout_core::ServiceInstance;

/// Callbacks invoked as service instances of a browsed type come and go.
///
/// Implementations must tolerate being called from the client's dispatch
/// context; heavy work belongs on the consumer's own executor.
pub trait ServiceListener: Send + Sync {
    /// A previously unseen instance became resolved.
    fn on_service_added(&self, instance: &ServiceInstance);

    /// An emitted instance's host, port, addresses or TXT data changed.
    fn on_service_updated(&self, instance: &ServiceInstance) {
        let _ = instance;
    }

    /// An emitted instance's PTR expired or a goodbye arrived.
    fn on_service_removed(&self, instance: &ServiceInstance) {
        let _ = instance;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrowserState {
    Created,
    Running,
    Stopped,
}

enum Event {
    Added(ServiceInstance),
    Updated(ServiceInstance),
    Removed(ServiceInstance),
}

struct BrowserCore {
    state: BrowserState,
    listeners: Vec<Arc<dyn ServiceListener>>,
    /// Instances already delivered via `on_service_added`, by lowercased
    /// instance name.
    emitted: HashMap<String, ServiceInstance>,
}

pub(crate) struct BrowserInner {
    pub(crate) id: Uuid,
    /// Display form of the browsed type, trailing dot included.
    pub(crate) service_type: String,
    /// Lowercased matching key.
    pub(crate) type_key: String,
    core: Mutex<BrowserCore>,
}

impl BrowserInner {
    pub(crate) fn new(service_type: String, listener: Arc<dyn ServiceListener>) -> Arc<Self> {
        let type_key = service_type.to_ascii_lowercase();
        Arc::new(Self {
            id: Uuid::new_v4(),
            service_type,
            type_key,
            core: Mutex::new(BrowserCore {
                state: BrowserState::Created,
                listeners: vec![listener],
                emitted: HashMap::new(),
            }),
        })
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn ServiceListener>) {
        self.core.lock().listeners.push(listener);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.core.lock().state == BrowserState::Running
    }

    /// Created → Running. Returns false if the browser already left
    /// Created (Stopped is terminal, there is no restart).
    pub(crate) fn start(&self) -> bool {
        let mut core = self.core.lock();
        if core.state != BrowserState::Created {
            return false;
        }
        core.state = BrowserState::Running;
        true
    }

    /// Any state → Stopped. Returns true on the first transition.
    pub(crate) fn stop(&self) -> bool {
        let mut core = self.core.lock();
        if core.state == BrowserState::Stopped {
            return false;
        }
        core.state = BrowserState::Stopped;
        true
    }

    /// Diffs a post-mutation snapshot of this type against what has been
    /// emitted and delivers the resulting events.
    ///
    /// `current` maps lowercased instance names to their resolved view, or
    /// `None` while the instance is tracked but not yet resolvable.
    pub(crate) fn apply_snapshot(&self, current: HashMap<String, Option<ServiceInstance>>) {
        let (events, listeners) = {
            let mut core = self.core.lock();
            if core.state != BrowserState::Running {
                return;
            }

            let mut events = Vec::new();

            let mut gone: Vec<String> = core
                .emitted
                .keys()
                .filter(|name| !current.contains_key(*name))
                .cloned()
                .collect();
            gone.sort();
            for name in gone {
                if let Some(instance) = core.emitted.remove(&name) {
                    events.push(Event::Removed(instance));
                }
            }

            let mut names: Vec<&String> = current.keys().collect();
            names.sort();
            for name in names {
                let Some(instance) = &current[name] else {
                    // Tracked but unresolved; an instance that lost its
                    // address keeps its emitted entry until the PTR dies.
                    continue;
                };
                match core.emitted.get(name) {
                    None => {
                        core.emitted.insert(name.clone(), instance.clone());
                        events.push(Event::Added(instance.clone()));
                    }
                    Some(previous) if !previous.same_endpoint(instance) => {
                        let mut updated = instance.clone();
                        updated.discovered_at = previous.discovered_at;
                        core.emitted.insert(name.clone(), updated.clone());
                        events.push(Event::Updated(updated));
                    }
                    Some(_) => {}
                }
            }

            (events, core.listeners.clone())
        };

        // Callbacks run outside the browser lock so a listener may call
        // back into the API (stop, add_listener) without deadlocking.
        for event in &events {
            for listener in &listeners {
                self.deliver(listener, event);
            }
        }
    }

    fn deliver(&self, listener: &Arc<dyn ServiceListener>, event: &Event) {
        let result = catch_unwind(AssertUnwindSafe(|| match event {
            Event::Added(instance) => listener.on_service_added(instance),
            Event::Updated(instance) => listener.on_service_updated(instance),
            Event::Removed(instance) => listener.on_service_removed(instance),
        }));
        if result.is_err() {
            error!(
                browser = %self.id,
                service_type = %self.service_type,
                "listener panicked during dispatch; continuing"
            );
        }
    }
}

/// Handle to a running browser, returned by `browse`.
pub struct BrowserHandle {
    inner: Arc<BrowserInner>,
    engine: Arc<Engine>,
}

impl BrowserHandle {
    pub(crate) fn new(inner: Arc<BrowserInner>, engine: Arc<Engine>) -> Self {
        Self { inner, engine }
    }

    /// The browsed service type in normalized form.
    pub fn service_type(&self) -> &str {
        &self.inner.service_type
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Appends a listener to the browser's ordered set.
    pub fn add_listener(&self, listener: Arc<dyn ServiceListener>) {
        self.inner.add_listener(listener);
    }

    /// Stops the browser. Terminal and idempotent: later cache events are
    /// ignored and the browser cannot be restarted.
    pub fn stop(&self) {
        if self.inner.stop() {
            self.engine.deregister_browser(&self.inner);
            debug!(service_type = %self.inner.service_type, "browser stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::net::IpAddr;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(&'static str, String)>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<(&'static str, String)> {
            self.events.lock().clone()
        }
    }

    impl ServiceListener for Recorder {
        fn on_service_added(&self, instance: &ServiceInstance) {
            self.events
                .lock()
                .push(("added", instance.short_name().to_string()));
        }

        fn on_service_updated(&self, instance: &ServiceInstance) {
            self.events
                .lock()
                .push(("updated", instance.short_name().to_string()));
        }

        fn on_service_removed(&self, instance: &ServiceInstance) {
            self.events
                .lock()
                .push(("removed", instance.short_name().to_string()));
        }
    }

    fn instance(name: &str, port: u16) -> ServiceInstance {
        ServiceInstance::new(
            format!("{}._http._tcp.local.", name),
            "_http._tcp.local.".to_string(),
            "host.local.".to_string(),
            port,
            vec!["192.168.1.10".parse::<IpAddr>().unwrap()],
            StdHashMap::new(),
        )
    }

    fn snapshot(entries: &[(&str, Option<ServiceInstance>)]) -> HashMap<String, Option<ServiceInstance>> {
        entries
            .iter()
            .map(|(name, inst)| {
                (
                    format!("{}._http._tcp.local.", name.to_ascii_lowercase()),
                    inst.clone(),
                )
            })
            .collect()
    }

    fn running_browser(listener: Arc<dyn ServiceListener>) -> Arc<BrowserInner> {
        let browser = BrowserInner::new("_http._tcp.local.".to_string(), listener);
        assert!(browser.start());
        browser
    }

    #[test]
    fn resolved_instance_emitted_once() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());

        let snap = snapshot(&[("Web Server", Some(instance("Web Server", 80)))]);
        browser.apply_snapshot(snap.clone());
        browser.apply_snapshot(snap);

        assert_eq!(recorder.events(), vec![("added", "Web Server".to_string())]);
    }

    #[test]
    fn unresolved_instance_not_emitted() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());

        browser.apply_snapshot(snapshot(&[("Web Server", None)]));
        assert!(recorder.events().is_empty());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        assert_eq!(recorder.events(), vec![("added", "Web Server".to_string())]);
    }

    #[test]
    fn endpoint_change_emits_update() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 8080)))]));

        assert_eq!(
            recorder.events(),
            vec![
                ("added", "Web Server".to_string()),
                ("updated", "Web Server".to_string()),
            ]
        );
    }

    #[test]
    fn disappearance_emits_remove_once() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        browser.apply_snapshot(snapshot(&[]));
        browser.apply_snapshot(snapshot(&[]));

        assert_eq!(
            recorder.events(),
            vec![
                ("added", "Web Server".to_string()),
                ("removed", "Web Server".to_string()),
            ]
        );
    }

    #[test]
    fn lost_address_keeps_instance_until_ptr_dies() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        browser.apply_snapshot(snapshot(&[("Web Server", None)]));
        assert_eq!(recorder.events(), vec![("added", "Web Server".to_string())]);

        browser.apply_snapshot(snapshot(&[]));
        assert_eq!(
            recorder.events(),
            vec![
                ("added", "Web Server".to_string()),
                ("removed", "Web Server".to_string()),
            ]
        );
    }

    #[test]
    fn stopped_browser_ignores_snapshots() {
        let recorder = Arc::new(Recorder::default());
        let browser = running_browser(recorder.clone());
        assert!(browser.stop());
        assert!(!browser.stop());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn panicking_listener_does_not_poison_dispatch() {
        struct Panicker;
        impl ServiceListener for Panicker {
            fn on_service_added(&self, _: &ServiceInstance) {
                panic!("listener bug");
            }
        }

        let recorder = Arc::new(Recorder::default());
        let browser = BrowserInner::new("_http._tcp.local.".to_string(), Arc::new(Panicker));
        browser.add_listener(recorder.clone());
        assert!(browser.start());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));

        // The second listener still saw the event, and the browser remains
        // usable for the next dispatch.
        assert_eq!(recorder.events(), vec![("added", "Web Server".to_string())]);
        browser.apply_snapshot(snapshot(&[]));
        assert_eq!(
            recorder.events(),
            vec![
                ("added", "Web Server".to_string()),
                ("removed", "Web Server".to_string()),
            ]
        );
    }

    #[test]
    fn listeners_receive_events_in_registration_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let browser = BrowserInner::new("_http._tcp.local.".to_string(), first.clone());
        browser.add_listener(second.clone());
        assert!(browser.start());

        browser.apply_snapshot(snapshot(&[("Web Server", Some(instance("Web Server", 80)))]));
        assert_eq!(first.events(), second.events());
    }
}
