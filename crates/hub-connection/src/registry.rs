//! Device registry: routes inbound updates to the proxies interested in them.
//!
//! The registry holds weak references only. Proxies are owned by the host;
//! an entry whose proxy was dropped is ignored and pruned on the next
//! dispatch that touches it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, trace};

use hearthlink_protocol::{DeviceId, Values};

/// Receiver of state pushes for one device.
pub trait UpdateListener: Send + Sync {
    fn update(&self, values: &Values);
}

/// Maps hub device identifiers to the proxy currently registered for them.
#[derive(Default)]
pub struct DeviceRegistry {
    entries: RwLock<HashMap<DeviceId, Weak<dyn UpdateListener>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `id`, replacing any previous registration.
    pub fn register(&self, id: DeviceId, listener: Weak<dyn UpdateListener>) {
        debug!(device = %id, "registering device for updates");
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(id, listener);
        }
    }

    /// Convenience wrapper over [`register`](Self::register) for a concrete proxy.
    pub fn register_arc<L: UpdateListener + 'static>(&self, id: DeviceId, listener: &Arc<L>) {
        let weak: Weak<L> = Arc::downgrade(listener);
        self.register(id, weak);
    }

    /// Delivers `values` to every live proxy registered under one of `devices`.
    ///
    /// Unknown identifiers are ignored. Returns the number of proxies updated.
    pub fn dispatch(&self, devices: &[DeviceId], values: &Values) -> usize {
        let mut live: Vec<Arc<dyn UpdateListener>> = Vec::new();
        let mut dead: Vec<&DeviceId> = Vec::new();
        {
            let Ok(entries) = self.entries.read() else {
                return 0;
            };
            for id in devices {
                match entries.get(id) {
                    Some(weak) => match weak.upgrade() {
                        Some(listener) => {
                            trace!(device = %id, "external update");
                            live.push(listener);
                        }
                        None => dead.push(id),
                    },
                    None => trace!(device = %id, "update for unregistered device"),
                }
            }
        }

        if !dead.is_empty()
            && let Ok(mut entries) = self.entries.write()
        {
            for id in dead {
                if entries.get(id).is_some_and(|w| w.strong_count() == 0) {
                    entries.remove(id);
                }
            }
        }

        // Listeners run outside the lock so they may touch the registry.
        for listener in &live {
            listener.update(values);
        }
        live.len()
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.entries
            .read()
            .map(|e| e.get(id).is_some_and(|w| w.strong_count() > 0))
            .unwrap_or(false)
    }

    /// Number of registrations, including ones whose proxy is gone.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Values>>,
    }

    impl UpdateListener for Recorder {
        fn update(&self, values: &Values) {
            self.seen.lock().unwrap().push(values.clone());
        }
    }

    fn values(state: &str) -> Values {
        let mut v = Values::new();
        v.insert("state".into(), state.into());
        v
    }

    #[test]
    fn dispatch_to_registered_device() {
        let registry = DeviceRegistry::new();
        let rec = Arc::new(Recorder::default());
        registry.register_arc("lamp".into(), &rec);

        let n = registry.dispatch(&["lamp".into()], &values("on"));
        assert_eq!(n, 1);
        assert_eq!(rec.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unregistered_identifiers_are_ignored() {
        let registry = DeviceRegistry::new();
        for _ in 0..5 {
            assert_eq!(registry.dispatch(&["ghost".into(), "7".into()], &values("on")), 0);
        }
        assert!(registry.is_empty());
        assert!(!registry.contains(&"ghost".into()));
    }

    #[test]
    fn last_registration_wins() {
        let registry = DeviceRegistry::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        registry.register_arc("lamp".into(), &first);
        registry.register_arc("lamp".into(), &second);

        registry.dispatch(&["lamp".into()], &values("off"));
        assert!(first.seen.lock().unwrap().is_empty());
        assert_eq!(second.seen.lock().unwrap().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dropped_proxy_is_pruned() {
        let registry = DeviceRegistry::new();
        let rec = Arc::new(Recorder::default());
        registry.register_arc("lamp".into(), &rec);
        assert!(registry.contains(&"lamp".into()));
        drop(rec);

        assert_eq!(registry.dispatch(&["lamp".into()], &values("on")), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn per_device_arrival_order_is_preserved() {
        let registry = DeviceRegistry::new();
        let rec = Arc::new(Recorder::default());
        registry.register_arc("lamp".into(), &rec);

        for state in ["on", "off", "on"] {
            registry.dispatch(&["lamp".into()], &values(state));
        }
        let seen: Vec<String> = rec
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v["state"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(seen, vec!["on", "off", "on"]);
    }

    #[test]
    fn one_event_fans_out_to_several_devices() {
        let registry = DeviceRegistry::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        registry.register_arc("a".into(), &a);
        registry.register_arc("b".into(), &b);

        assert_eq!(
            registry.dispatch(&["a".into(), "b".into(), "c".into()], &values("on")),
            2
        );
    }
}
