//! The status monitor facade.

use std::sync::Arc;

use termhome_common::TermhomeResult;
use tokio::sync::mpsc;

use crate::discovery;
use crate::reconcile::{self, ReconcileReport};
use crate::runtime::{ContainerRuntime, DockerClient, RuntimeConfig};
use crate::scheduler::{Scheduler, TaskKey};
use crate::state::{MonitorEvent, State, StatusEvents, StatusResult};
use crate::store::StatusStore;
use crate::target::{Monitoring, Target};

/// Message shown for container targets until the first reconciliation.
pub const WAITING_FOR_CONTAINER: &str = "Waiting for container status...";

struct MonitorInner {
    store: Arc<StatusStore>,
    scheduler: Scheduler,
}

impl MonitorInner {
    fn add_target(&self, target: Target) {
        if target.disable_status {
            tracing::info!(target_name = %target.name, "Status monitoring disabled");
            return;
        }

        let monitoring = target.monitoring();
        if monitoring == Monitoring::Inert {
            tracing::debug!(target_name = %target.name, "Target has no monitoring configuration");
        } else {
            tracing::info!(target_name = %target.name, ?monitoring, "Adding target to status monitor");
        }

        // The old task must be gone before the new descriptor is visible.
        self.scheduler.cancel(&TaskKey::Target(target.name.clone()));
        self.store.register(target.clone());
        self.seed(&target);
        self.scheduler.schedule(&target);
    }

    /// Register a discovered target unless its name is taken.
    fn add_discovered(&self, target: Target) -> bool {
        if !self.store.register_if_absent(target.clone()) {
            return false;
        }
        self.seed(&target);
        self.scheduler.schedule(&target);
        self.store.announce(MonitorEvent::Discovered { target });
        true
    }

    fn seed(&self, target: &Target) {
        if let Some(status) = target.static_status() {
            self.store
                .upsert(&target.name, State::from_static(status), "");
        } else if target.container_ref().is_some() {
            self.store
                .upsert(&target.name, State::Unknown, WAITING_FOR_CONTAINER);
        }
    }

    async fn reconcile_once(
        &self,
        runtime: &dyn ContainerRuntime,
        config: &RuntimeConfig,
    ) -> TermhomeResult<ReconcileReport> {
        let containers = runtime.list_containers().await?;
        tracing::debug!(endpoint = %runtime.endpoint(), count = containers.len(), "Listed containers");

        let pass = reconcile::reconcile(&self.store, &containers);

        let discovered = if config.disable_autodiscovery {
            tracing::debug!("Autodiscovery disabled, skipping");
            Vec::new()
        } else {
            discovery::discover(&self.store, &pass.unprocessed, |target| {
                self.add_discovered(target)
            })
        };

        Ok(ReconcileReport {
            containers: containers.len(),
            matched: pass.matched,
            missing: pass.missing,
            discovered,
        })
    }
}

/// Tracks the health of every registered target.
///
/// Create one per process and hand it to whoever needs it. Status changes are
/// delivered on the [`StatusEvents`] receiver returned by [`StatusMonitor::new`].
/// Dropping the monitor stops all of its tasks.
pub struct StatusMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for StatusMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusMonitor")
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

impl StatusMonitor {
    /// Create a monitor and the channel its changes are reported on.
    #[must_use]
    pub fn new() -> (Self, StatusEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let store = Arc::new(StatusStore::new(events));
        let scheduler = Scheduler::new(Arc::clone(&store));
        let monitor = Self {
            inner: Arc::new(MonitorInner { store, scheduler }),
        };
        (monitor, receiver)
    }

    /// Register a target, replacing any target of the same name, and start
    /// monitoring it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_target(&self, target: Target) {
        self.inner.add_target(target);
    }

    /// Override every probe interval. Only positive values take effect, and
    /// only for targets added afterwards.
    pub fn set_global_interval(&self, seconds: u64) {
        self.inner.scheduler.set_global_interval(seconds);
    }

    /// Check that the configured Docker runtime answers, then reconcile on
    /// the configured interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the runtime cannot
    /// be reached.
    pub async fn enable_reconciliation(&self, config: RuntimeConfig) -> TermhomeResult<()> {
        let runtime = Arc::new(DockerClient::from_config(&config)?);
        self.enable_reconciliation_with(config, runtime).await
    }

    /// Like [`Self::enable_reconciliation`] with any container runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime does not answer its ping.
    pub async fn enable_reconciliation_with(
        &self,
        config: RuntimeConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> TermhomeResult<()> {
        runtime.ping().await?;

        let period = config.effective_interval();
        tracing::info!(
            endpoint = %runtime.endpoint(),
            interval_secs = period.as_secs(),
            "Starting container reconciliation"
        );

        let inner = Arc::clone(&self.inner);
        let config = Arc::new(config);
        self.inner
            .scheduler
            .spawn_periodic(TaskKey::Reconciler, period, move || {
                let inner = Arc::clone(&inner);
                let runtime = Arc::clone(&runtime);
                let config = Arc::clone(&config);
                async move {
                    if let Err(e) = inner.reconcile_once(runtime.as_ref(), &config).await {
                        tracing::warn!(endpoint = %runtime.endpoint(), error = %e, "Container reconciliation failed");
                    }
                }
            });
        Ok(())
    }

    /// Run one reconciliation pass against the configured Docker runtime.
    ///
    /// Meant for startup, so the first render is not all `Unknown`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be reached or answers badly.
    pub async fn run_initial_reconciliation(
        &self,
        config: &RuntimeConfig,
    ) -> TermhomeResult<ReconcileReport> {
        let runtime = DockerClient::from_config(config)?;
        self.run_initial_reconciliation_with(config, &runtime).await
    }

    /// Like [`Self::run_initial_reconciliation`] with any container runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if listing containers fails.
    pub async fn run_initial_reconciliation_with(
        &self,
        config: &RuntimeConfig,
        runtime: &dyn ContainerRuntime,
    ) -> TermhomeResult<ReconcileReport> {
        tracing::info!(endpoint = %runtime.endpoint(), "Running initial container reconciliation");
        let report = self.inner.reconcile_once(runtime, config).await?;
        tracing::info!(
            matched = report.matched.len(),
            missing = report.missing.len(),
            discovered = report.discovered.len(),
            "Initial container reconciliation completed"
        );
        Ok(report)
    }

    /// Current result for `name`; "not monitored" if it was never registered.
    #[must_use]
    pub fn get(&self, name: &str) -> StatusResult {
        self.inner.store.get(name)
    }

    /// `"<state> <message>"`, or an empty string if nothing was checked yet.
    #[must_use]
    pub fn status_line(&self, name: &str) -> String {
        let result = self.get(name);
        if result.state == State::Unknown && result.last_checked.is_none() {
            return String::new();
        }
        format!("{} {}", result.state, result.message)
    }

    /// Registered descriptor for `name`.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<Target> {
        self.inner.store.target(name)
    }

    /// Display group of a registered target.
    #[must_use]
    pub fn group_of(&self, name: &str) -> Option<String> {
        self.target(name).and_then(|t| t.group)
    }

    /// Names of all registered targets, sorted.
    #[must_use]
    pub fn target_names(&self) -> Vec<String> {
        self.inner.store.names()
    }

    /// Number of running periodic tasks, reconciler included.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.scheduler.task_count()
    }

    /// Stop every probe task and the reconciler.
    ///
    /// Safe to call more than once. Results stay readable afterwards.
    pub fn stop(&self) {
        tracing::info!("Stopping status monitor");
        self.inner.scheduler.stop_all();
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.inner.scheduler.stop_all();
    }
}
