//! End-to-end monitor behavior: scheduling, reconciliation and discovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State as Shared;
use axum::http::StatusCode;
use axum::routing::get;
use parking_lot::Mutex;
use termhome_common::{TermhomeError, TermhomeResult};
use termhome_status::{
    ContainerRuntime, ContainerSnapshot, HttpSpec, MonitorEvent, RuntimeConfig, State,
    StatusEvents, StatusMonitor, Target,
};

/// In-memory container runtime.
struct FakeRuntime {
    containers: Mutex<Vec<ContainerSnapshot>>,
    reachable: bool,
}

impl FakeRuntime {
    fn new(containers: Vec<ContainerSnapshot>) -> Self {
        Self {
            containers: Mutex::new(containers),
            reachable: true,
        }
    }

    fn unreachable() -> Self {
        Self {
            containers: Mutex::new(Vec::new()),
            reachable: false,
        }
    }

    fn check(&self) -> TermhomeResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(TermhomeError::RuntimeUnreachable {
                endpoint: self.endpoint(),
                reason: "connection refused".to_string(),
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn endpoint(&self) -> String {
        "fake://runtime".to_string()
    }

    async fn ping(&self) -> TermhomeResult<()> {
        self.check()
    }

    async fn list_containers(&self) -> TermhomeResult<Vec<ContainerSnapshot>> {
        self.check()?;
        Ok(self.containers.lock().clone())
    }
}

async fn respond(Shared(code): Shared<Arc<AtomicU16>>) -> StatusCode {
    StatusCode::from_u16(code.load(Ordering::SeqCst)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn spawn_endpoint(code: Arc<AtomicU16>) -> String {
    let app = Router::new().route("/", get(respond)).with_state(code);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

/// Wait for the next status change of `name` matching `state`.
async fn wait_for(events: &mut StatusEvents, name: &str, state: State) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            if let MonitorEvent::Changed(change) = event {
                if change.name == name && change.state == state {
                    return;
                }
            }
        }
    })
    .await
    .expect("status change did not arrive in time");
}

fn drain(events: &mut StatusEvents) -> Vec<MonitorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[test_log::test(tokio::test)]
async fn http_target_reports_each_transition_once() {
    let code = Arc::new(AtomicU16::new(200));
    let url = spawn_endpoint(Arc::clone(&code)).await;

    let (monitor, mut events) = StatusMonitor::new();
    let mut site = HttpSpec::url(url.clone()).with_expected_codes(vec![200]);
    site.interval = Some(1);
    monitor.add_target(Target::new("svc").with_href(url).with_site_monitor(site));

    assert_eq!(monitor.get("svc").state, State::Unknown);
    assert_eq!(monitor.task_count(), 1);

    wait_for(&mut events, "svc", State::Ok).await;
    assert_eq!(monitor.get("svc").state, State::Ok);

    code.store(500, Ordering::SeqCst);
    wait_for(&mut events, "svc", State::Critical).await;
    assert_eq!(monitor.get("svc").message, "Server error: 500");

    // Further ticks with the same answer stay quiet.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let repeats = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, MonitorEvent::Changed(c) if c.name == "svc"))
        .count();
    assert_eq!(repeats, 0);

    monitor.stop();
    assert_eq!(monitor.task_count(), 0);
}

#[tokio::test]
async fn exact_container_match_is_not_revisited() {
    let (monitor, _events) = StatusMonitor::new();
    monitor.add_target(Target::new("Web").with_container("web", "local-docker"));

    let runtime = FakeRuntime::new(vec![
        ContainerSnapshot::named("web").with_status("Up 2 hours"),
        ContainerSnapshot::named("web-2").with_status("Exited (1) 3 minutes ago"),
    ]);
    let report = monitor
        .run_initial_reconciliation_with(&RuntimeConfig::default(), &runtime)
        .await
        .unwrap();

    assert_eq!(report.containers, 2);
    assert_eq!(report.matched, vec!["Web".to_string()]);
    assert_eq!(monitor.get("Web").state, State::Ok);
    assert_eq!(monitor.get("Web").message, "Running (Up 2 hours)");
}

#[tokio::test]
async fn missing_container_turns_critical() {
    let (monitor, _events) = StatusMonitor::new();
    monitor.add_target(Target::new("Cache").with_container("redis", "local-docker"));
    assert_eq!(monitor.get("Cache").state, State::Unknown);

    let runtime = FakeRuntime::new(Vec::new());
    let report = monitor
        .run_initial_reconciliation_with(&RuntimeConfig::default(), &runtime)
        .await
        .unwrap();

    assert_eq!(report.missing, vec!["Cache".to_string()]);
    assert_eq!(monitor.get("Cache").state, State::Critical);
    assert_eq!(monitor.get("Cache").message, "Container not found");
}

#[test_log::test(tokio::test)]
async fn labelled_container_is_discovered_once() {
    let (monitor, mut events) = StatusMonitor::new();
    let runtime = FakeRuntime::new(vec![
        ContainerSnapshot::named("foo_app_1")
            .with_image("example/foo:1.2")
            .with_status("Up 5 minutes")
            .with_label("homepage.name", "Foo")
            .with_label("homepage.group", "Apps"),
        ContainerSnapshot::named("sidecar").with_status("Up 5 minutes"),
    ]);
    let config = RuntimeConfig::default();

    let first = monitor
        .run_initial_reconciliation_with(&config, &runtime)
        .await
        .unwrap();
    assert_eq!(first.discovered, vec!["Foo".to_string()]);
    assert_eq!(monitor.target_names(), vec!["Foo".to_string()]);
    assert_eq!(monitor.get("Foo").state, State::Ok);
    assert_eq!(monitor.group_of("Foo").as_deref(), Some("Apps"));

    let second = monitor
        .run_initial_reconciliation_with(&config, &runtime)
        .await
        .unwrap();
    assert!(second.discovered.is_empty());
    assert_eq!(second.matched, vec!["Foo".to_string()]);
    assert_eq!(monitor.target_names(), vec!["Foo".to_string()]);

    let discovered = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, MonitorEvent::Discovered { .. }))
        .count();
    assert_eq!(discovered, 1);
}

#[tokio::test]
async fn discovery_respects_existing_and_disabled() {
    let (monitor, _events) = StatusMonitor::new();
    monitor.add_target(Target::new("Foo").with_status("warning"));
    let runtime = FakeRuntime::new(vec![
        ContainerSnapshot::named("foo")
            .with_status("Up 1 minute")
            .with_label("homepage.name", "Foo"),
        ContainerSnapshot::named("bar")
            .with_status("Up 1 minute")
            .with_label("homepage.name", "Bar"),
    ]);

    let disabled = RuntimeConfig::default().without_autodiscovery();
    let report = monitor
        .run_initial_reconciliation_with(&disabled, &runtime)
        .await
        .unwrap();
    assert!(report.discovered.is_empty());
    assert_eq!(monitor.target_names(), vec!["Foo".to_string()]);

    let report = monitor
        .run_initial_reconciliation_with(&RuntimeConfig::default(), &runtime)
        .await
        .unwrap();
    assert_eq!(report.discovered, vec!["Bar".to_string()]);
    // The pre-existing target keeps its own status.
    assert_eq!(monitor.get("Foo").state, State::Warning);
}

#[tokio::test]
async fn unreachable_runtime_is_reported() {
    let (monitor, _events) = StatusMonitor::new();
    let runtime = Arc::new(FakeRuntime::unreachable());

    let err = monitor
        .enable_reconciliation_with(RuntimeConfig::default(), runtime.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, TermhomeError::RuntimeUnreachable { .. }));
    assert_eq!(monitor.task_count(), 0);

    let err = monitor
        .run_initial_reconciliation_with(&RuntimeConfig::default(), runtime.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, TermhomeError::RuntimeUnreachable { .. }));
}

#[tokio::test]
async fn periodic_reconciliation_runs_immediately() {
    let (monitor, mut events) = StatusMonitor::new();
    monitor.add_target(Target::new("Db").with_container("postgres", "local-docker"));
    let runtime = Arc::new(FakeRuntime::new(vec![
        ContainerSnapshot::named("postgres").with_status("Up 1 hour (healthy)"),
    ]));

    monitor
        .enable_reconciliation_with(RuntimeConfig::default().with_interval(30), runtime)
        .await
        .unwrap();
    assert_eq!(monitor.task_count(), 1);

    wait_for(&mut events, "Db", State::Ok).await;
    assert_eq!(monitor.get("Db").message, "Up (healthy)");

    monitor.stop();
    assert_eq!(monitor.task_count(), 0);
}
