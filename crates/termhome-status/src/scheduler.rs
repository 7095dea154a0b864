//! Periodic probe tasks.
//!
//! Every ping or HTTP target gets its own tokio task that probes once right
//! away and then on a fixed interval. Each task owns a private stop signal.
//! The container reconciler runs on the same machinery under its own key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::probe::{HttpProbe, PingProbe};
use crate::store::StatusStore;
use crate::target::{DEFAULT_INTERVAL, Monitoring, Target};

/// Identifies a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// Probe loop for a named target.
    Target(String),
    /// The container reconciliation loop.
    Reconciler,
}

struct ScheduledTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn stop(self) {
        // The task may already be gone; a closed channel is fine.
        let _ = self.stop.send(());
        // An in-flight probe must not write after its target was replaced.
        self.handle.abort();
    }
}

/// Owns the periodic tasks and the global interval override.
pub struct Scheduler {
    store: Arc<StatusStore>,
    tasks: Mutex<HashMap<TaskKey, ScheduledTask>>,
    /// Seconds; zero means no override.
    global_interval: AtomicU64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_count())
            .field("global_interval", &self.global_interval.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler writing into `store`.
    #[must_use]
    pub fn new(store: Arc<StatusStore>) -> Self {
        Self {
            store,
            tasks: Mutex::new(HashMap::new()),
            global_interval: AtomicU64::new(0),
        }
    }

    /// Override every target's interval. Zero is ignored.
    ///
    /// Only tasks scheduled afterwards pick up the new value.
    pub fn set_global_interval(&self, seconds: u64) -> bool {
        if seconds == 0 {
            return false;
        }
        tracing::info!(seconds, "Setting global status check interval");
        self.global_interval.store(seconds, Ordering::Relaxed);
        true
    }

    /// Global override, else the target's own interval, else the default.
    #[must_use]
    pub fn resolve_interval(&self, own: Option<u64>) -> Duration {
        let global = self.global_interval.load(Ordering::Relaxed);
        if global > 0 {
            return Duration::from_secs(global);
        }
        own.filter(|s| *s > 0)
            .map_or(DEFAULT_INTERVAL, Duration::from_secs)
    }

    /// (Re)start the probe task for a target.
    ///
    /// Any previous task under the same name is stopped first. Targets that
    /// are not ping or HTTP monitored end up with no task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime and a task must be spawned.
    pub fn schedule(&self, target: &Target) {
        let key = TaskKey::Target(target.name.clone());
        self.cancel(&key);

        let name = target.name.clone();
        let store = Arc::clone(&self.store);

        match target.monitoring() {
            Monitoring::Ping => {
                let ping = target.ping.clone().unwrap_or_default();
                let period = self.resolve_interval(ping.interval);
                let probe = PingProbe::new(target.effective_host(), ping.effective_count());
                tracing::info!(target_name = %name, interval_secs = period.as_secs(), "Starting ping monitoring");

                self.spawn_periodic(key, period, move || {
                    let probe = probe.clone();
                    let store = Arc::clone(&store);
                    let name = name.clone();
                    async move {
                        let outcome = probe.check().await;
                        store.record(&name, &outcome);
                    }
                });
            }
            Monitoring::Http => {
                let interval = target.site_monitor.as_ref().and_then(|s| s.interval);
                let period = self.resolve_interval(interval);
                let probe = HttpProbe::from_target(target);
                tracing::info!(target_name = %name, interval_secs = period.as_secs(), "Starting HTTP monitoring");

                self.spawn_periodic(key, period, move || {
                    let probe = probe.clone();
                    let store = Arc::clone(&store);
                    let name = name.clone();
                    async move {
                        let outcome = probe.check().await;
                        store.record(&name, &outcome);
                    }
                });
            }
            Monitoring::Container | Monitoring::Static | Monitoring::Inert => {
                tracing::debug!(target_name = %name, "No probe task for target");
            }
        }
    }

    /// Run `tick` immediately and then every `period` until stopped.
    ///
    /// A tick never overlaps the previous one; late ticks are delayed rather
    /// than bunched up.
    pub fn spawn_periodic<F, Fut>(&self, key: TaskKey, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });

        let previous = self
            .tasks
            .lock()
            .insert(key, ScheduledTask { stop, handle });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Stop one task, if it exists.
    pub fn cancel(&self, key: &TaskKey) {
        let task = self.tasks.lock().remove(key);
        if let Some(task) = task {
            tracing::debug!(?key, "Stopping task");
            task.stop();
        }
    }

    /// Stop every task and clear the table.
    pub fn stop_all(&self) {
        let tasks: Vec<ScheduledTask> = self.tasks.lock().drain().map(|(_, t)| t).collect();
        if !tasks.is_empty() {
            tracing::info!(count = tasks.len(), "Stopping status monitor tasks");
        }
        for task in tasks {
            task.stop();
        }
    }

    /// Number of live task entries.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether a task is registered under `key`.
    #[must_use]
    pub fn is_scheduled(&self, key: &TaskKey) -> bool {
        self.tasks.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{HttpSpec, PingSpec};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    fn scheduler() -> Scheduler {
        let (tx, _rx) = mpsc::unbounded_channel();
        Scheduler::new(Arc::new(StatusStore::new(tx)))
    }

    #[test]
    fn interval_resolution() {
        let scheduler = scheduler();
        assert_eq!(scheduler.resolve_interval(None), Duration::from_secs(60));
        assert_eq!(scheduler.resolve_interval(Some(0)), Duration::from_secs(60));
        assert_eq!(scheduler.resolve_interval(Some(15)), Duration::from_secs(15));

        assert!(!scheduler.set_global_interval(0));
        assert_eq!(scheduler.resolve_interval(Some(15)), Duration::from_secs(15));

        assert!(scheduler.set_global_interval(5));
        assert_eq!(scheduler.resolve_interval(Some(15)), Duration::from_secs(5));
        assert_eq!(scheduler.resolve_interval(None), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn only_probed_targets_get_tasks() {
        let scheduler = scheduler();
        scheduler.schedule(&Target::new("static").with_status("ok"));
        scheduler.schedule(&Target::new("inert"));
        scheduler.schedule(&Target::new("box").with_container("box", "local-docker"));
        assert_eq!(scheduler.task_count(), 0);

        scheduler.schedule(&Target::new("router").with_ping(PingSpec::host("127.0.0.1")));
        scheduler.schedule(
            &Target::new("web").with_site_monitor(HttpSpec::url("http://127.0.0.1:9")),
        );
        assert_eq!(scheduler.task_count(), 2);

        scheduler.stop_all();
        assert_eq!(scheduler.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_runs_immediately_then_on_interval() {
        let scheduler = scheduler();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        scheduler.spawn_periodic(TaskKey::Reconciler, Duration::from_secs(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        scheduler.cancel(&TaskKey::Reconciler);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_task() {
        let scheduler = scheduler();
        let first = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first);
        let key = TaskKey::Target("svc".to_string());

        scheduler.spawn_periodic(key.clone(), Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        scheduler.spawn_periodic(key.clone(), Duration::from_secs(1), || async {});
        let before = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(first.load(Ordering::SeqCst), before);
        assert_eq!(scheduler.task_count(), 1);
        assert!(scheduler.is_scheduled(&key));
    }
}
