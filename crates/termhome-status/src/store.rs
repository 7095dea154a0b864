//! Shared target registry and result store.
//!
//! Both maps sit behind one reader/writer lock. The lock is never held across
//! an `.await` or across a call back into registration; callers that need to
//! act on many targets take a snapshot first and release the lock.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use parking_lot::RwLock;

use crate::probe::ProbeOutcome;
use crate::state::{EventSender, MonitorEvent, State, StatusChange, StatusResult};
use crate::target::Target;

#[derive(Debug, Default)]
struct StoreInner {
    targets: HashMap<String, Target>,
    results: HashMap<String, StatusResult>,
}

/// Concurrency-safe name → target and name → result maps.
#[derive(Debug)]
pub struct StatusStore {
    inner: RwLock<StoreInner>,
    events: EventSender,
}

impl StatusStore {
    /// Create an empty store that reports changes on `events`.
    #[must_use]
    pub fn new(events: EventSender) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    /// Insert or overwrite a target and seed its result as `Unknown`.
    ///
    /// Seeding does not notify; the first probe result is compared against it.
    pub fn register(&self, target: Target) {
        let mut inner = self.inner.write();
        Self::seed(&mut inner, target);
    }

    /// Insert a target only if no target with that name exists yet.
    ///
    /// Returns `true` if the target was inserted.
    pub fn register_if_absent(&self, target: Target) -> bool {
        let mut inner = self.inner.write();
        if inner.targets.contains_key(&target.name) {
            return false;
        }
        Self::seed(&mut inner, target);
        true
    }

    fn seed(inner: &mut StoreInner, target: Target) {
        inner
            .results
            .insert(target.name.clone(), StatusResult::default());
        inner.targets.insert(target.name.clone(), target);
    }

    /// Write a new state and message for `name`.
    ///
    /// Notifies when no entry existed, or when state or message differs from
    /// the stored value. Returns whether a notification was sent.
    pub fn upsert(&self, name: &str, state: State, message: &str) -> bool {
        self.write_result(name, state, message, None)
    }

    /// Write a probe outcome, keeping its latency when it carries one.
    pub fn record(&self, name: &str, outcome: &ProbeOutcome) -> bool {
        self.write_result(name, outcome.state, &outcome.message, outcome.latency)
    }

    fn write_result(
        &self,
        name: &str,
        state: State,
        message: &str,
        latency: Option<std::time::Duration>,
    ) -> bool {
        let mut inner = self.inner.write();
        let now = Utc::now();

        let changed = match inner.results.get_mut(name) {
            Some(result) => {
                let changed = result.state != state || result.message != message;
                if changed {
                    tracing::debug!(
                        target_name = name,
                        from = %result.state,
                        to = %state,
                        message,
                        "Status changed"
                    );
                }
                result.state = state;
                result.message = message.to_string();
                result.last_checked = Some(now);
                if latency.is_some() {
                    result.response_time = latency;
                }
                changed
            }
            None => {
                tracing::info!(target_name = name, %state, message, "Status created");
                inner.results.insert(
                    name.to_string(),
                    StatusResult {
                        state,
                        message: message.to_string(),
                        response_time: latency,
                        last_checked: Some(now),
                    },
                );
                true
            }
        };

        // Sent under the lock so per-target event order matches store order.
        // The channel is unbounded and never blocks; a closed receiver is fine.
        if changed {
            let _ = self.events.send(MonitorEvent::Changed(StatusChange {
                name: name.to_string(),
                state,
                message: message.to_string(),
            }));
        }
        changed
    }

    /// Publish a non-status event.
    pub fn announce(&self, event: MonitorEvent) {
        let _ = self.events.send(event);
    }

    /// Current result for `name`, or the "not monitored" sentinel.
    #[must_use]
    pub fn get(&self, name: &str) -> StatusResult {
        self.inner
            .read()
            .results
            .get(name)
            .cloned()
            .unwrap_or_else(StatusResult::not_monitored)
    }

    /// Registered descriptor for `name`.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<Target> {
        self.inner.read().targets.get(name).cloned()
    }

    /// Whether a target with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().targets.contains_key(name)
    }

    /// Registered target names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of container reference → target names, ordered by reference.
    #[must_use]
    pub fn container_index(&self) -> BTreeMap<String, Vec<String>> {
        let inner = self.inner.read();
        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for target in inner.targets.values() {
            if let Some(container) = target.container_ref() {
                index
                    .entry(container.to_string())
                    .or_default()
                    .push(target.name.clone());
            }
        }
        for names in index.values_mut() {
            names.sort();
        }
        index
    }
}
