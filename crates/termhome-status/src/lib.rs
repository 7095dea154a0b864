//! # termhome-status
//!
//! Status monitoring core for termhome.
//!
//! termhome-status provides:
//! - Ping, HTTP and container probes
//! - A change-aware result store shared by all probe tasks
//! - One periodic task per monitored target
//! - Container reconciliation against a Docker runtime, with label-based
//!   autodiscovery
//!
//! ```no_run
//! use termhome_status::{HttpSpec, MonitorEvent, StatusMonitor, Target};
//!
//! # async fn example() {
//! let (monitor, mut events) = StatusMonitor::new();
//! monitor.add_target(
//!     Target::new("web")
//!         .with_href("http://web.local")
//!         .with_site_monitor(HttpSpec::url("http://web.local")),
//! );
//!
//! while let Some(MonitorEvent::Changed(change)) = events.recv().await {
//!     println!("{} is {}: {}", change.name, change.state, change.message);
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod discovery;
pub mod monitor;
pub mod probe;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod target;

pub use monitor::StatusMonitor;
pub use probe::ProbeOutcome;
pub use reconcile::ReconcileReport;
pub use runtime::{ContainerRuntime, ContainerSnapshot, DockerClient, Health, RuntimeConfig};
pub use state::{MonitorEvent, State, StatusChange, StatusEvents, StatusResult};
pub use target::{HttpSpec, PingSpec, Target};
