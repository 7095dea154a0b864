//! Container inventory reconciliation.
//!
//! Matches live containers against targets that declare a container
//! reference. Exact name matches are applied first and never revisited.
//! References left over are then matched by substring in either direction,
//! which tolerates orchestrator-applied prefixes and suffixes. References
//! are visited in sorted order so the substring pass is deterministic.

use std::collections::HashSet;

use crate::probe::classify_container;
use crate::runtime::ContainerSnapshot;
use crate::state::State;
use crate::store::StatusStore;

/// Message for declared containers that are not running anywhere.
pub const NOT_FOUND: &str = "Container not found";

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Targets that received a container result.
    pub matched: Vec<String>,
    /// Targets whose container could not be found.
    pub missing: Vec<String>,
    /// Containers not claimed by any target, in listing order.
    pub unprocessed: Vec<ContainerSnapshot>,
}

/// Summary of a full cycle, including autodiscovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Containers listed by the runtime.
    pub containers: usize,
    /// Targets that received a container result.
    pub matched: Vec<String>,
    /// Targets whose container could not be found.
    pub missing: Vec<String>,
    /// Targets created by autodiscovery.
    pub discovered: Vec<String>,
}

/// Apply container states to every target with a container reference.
///
/// Takes its target index as a snapshot, so no store lock is held while
/// results are written.
pub fn reconcile(store: &StatusStore, containers: &[ContainerSnapshot]) -> Reconciliation {
    let index = store.container_index();
    tracing::debug!(
        containers = containers.len(),
        references = index.len(),
        "Reconciling containers"
    );

    let mut done_targets: HashSet<&str> = HashSet::new();
    let mut done_containers: HashSet<&str> = HashSet::new();
    let mut matched = Vec::new();

    // Exact matches.
    for container in containers {
        let Some(names) = index.get(&container.name) else {
            continue;
        };
        let outcome = classify_container(container);
        for name in names {
            tracing::debug!(container = %container.name, target_name = %name, "Exact container match");
            store.record(name, &outcome);
            done_targets.insert(name);
            matched.push(name.clone());
        }
        done_containers.insert(&container.name);
    }

    // Substring matches for whatever is left.
    for container in containers.iter().filter(|c| !c.name.is_empty()) {
        for (reference, names) in &index {
            if names.iter().all(|n| done_targets.contains(n.as_str())) {
                continue;
            }
            if !container.name.contains(reference.as_str())
                && !reference.contains(container.name.as_str())
            {
                continue;
            }

            let outcome = classify_container(container);
            let pending: Vec<&String> = names
                .iter()
                .filter(|n| !done_targets.contains(n.as_str()))
                .collect();
            for name in pending {
                tracing::debug!(
                    container = %container.name,
                    reference = %reference,
                    target_name = %name,
                    "Substring container match"
                );
                store.record(name, &outcome);
                done_targets.insert(name);
                matched.push(name.clone());
            }
            done_containers.insert(&container.name);
        }
    }

    let mut missing = Vec::new();
    for (reference, names) in &index {
        for name in names.iter().filter(|n| !done_targets.contains(n.as_str())) {
            tracing::debug!(target_name = %name, reference = %reference, "No container found");
            store.upsert(name, State::Critical, NOT_FOUND);
            missing.push(name.clone());
        }
    }

    let unprocessed = containers
        .iter()
        .filter(|c| !done_containers.contains(c.name.as_str()))
        .cloned()
        .collect();

    Reconciliation {
        matched,
        missing,
        unprocessed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MonitorEvent;
    use crate::target::Target;
    use tokio::sync::mpsc;

    fn store_with(targets: &[(&str, &str)]) -> (StatusStore, crate::state::StatusEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = StatusStore::new(tx);
        for (name, container) in targets {
            store.register(Target::new(*name).with_container(*container, "local-docker"));
        }
        (store, rx)
    }

    #[test]
    fn exact_match_wins_over_substring() {
        let (store, _rx) = store_with(&[("Web", "web")]);
        let containers = vec![
            ContainerSnapshot::named("web-2").with_status("Exited (1) 2 minutes ago"),
            ContainerSnapshot::named("web").with_status("Up 3 hours"),
        ];

        let result = reconcile(&store, &containers);

        assert_eq!(result.matched, vec!["Web".to_string()]);
        assert_eq!(store.get("Web").state, State::Ok);
        assert_eq!(store.get("Web").message, "Running (Up 3 hours)");
        let leftover: Vec<&str> = result.unprocessed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(leftover, vec!["web-2"]);
    }

    #[test]
    fn substring_match_tolerates_prefixes() {
        let (store, _rx) = store_with(&[("Grafana", "grafana")]);
        let containers = vec![ContainerSnapshot::named("monitoring_grafana_1").with_status("Up 1 day")];

        let result = reconcile(&store, &containers);

        assert_eq!(store.get("Grafana").state, State::Ok);
        assert!(result.unprocessed.is_empty());
    }

    #[test]
    fn reference_containing_container_name_matches() {
        let (store, _rx) = store_with(&[("DB", "stack_postgres_1")]);
        let containers = vec![ContainerSnapshot::named("postgres").with_status("Up 4 hours")];

        reconcile(&store, &containers);
        assert_eq!(store.get("DB").state, State::Ok);
    }

    #[test]
    fn substring_match_attaches_to_every_target_of_a_reference() {
        let (store, _rx) = store_with(&[("Api", "api"), ("Api Docs", "api")]);
        let containers = vec![ContainerSnapshot::named("prod-api-1").with_status("Restarting (1) 2 seconds ago")];

        let result = reconcile(&store, &containers);

        assert_eq!(result.matched.len(), 2);
        assert_eq!(store.get("Api").state, State::Warning);
        assert_eq!(store.get("Api Docs").state, State::Warning);
    }

    #[test]
    fn missing_container_is_critical() {
        let (store, mut rx) = store_with(&[("Cache", "redis")]);
        let containers = vec![ContainerSnapshot::named("nginx").with_status("Up 1 hour")];

        let result = reconcile(&store, &containers);

        assert_eq!(result.missing, vec!["Cache".to_string()]);
        let status = store.get("Cache");
        assert_eq!(status.state, State::Critical);
        assert_eq!(status.message, NOT_FOUND);

        // A second cycle with the same result does not notify again.
        reconcile(&store, &containers);
        let mut changes = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, MonitorEvent::Changed(_)) {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
    }
}
