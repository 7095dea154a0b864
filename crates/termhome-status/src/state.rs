//! Status states, results and change events.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::target::Target;

/// Observed health of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Not checked yet, or the check could not decide.
    #[default]
    Unknown,
    /// Target is up.
    Ok,
    /// Target is degraded.
    Warning,
    /// Target is down.
    Critical,
}

impl State {
    /// Map a static status string from configuration.
    ///
    /// Matching is case-insensitive; anything unrecognised is `Unknown`.
    #[must_use]
    pub fn from_static(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "ok" => Self::Ok,
            "warning" => Self::Warning,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// Lowercase name used in logs and status lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest observed result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusResult {
    /// Current state.
    pub state: State,
    /// Human-readable detail, e.g. "Up (12 ms)".
    pub message: String,
    /// Last measured latency.
    pub response_time: Option<Duration>,
    /// When the result was last written.
    pub last_checked: Option<DateTime<Utc>>,
}

impl StatusResult {
    /// Result returned for names that were never registered.
    #[must_use]
    pub fn not_monitored() -> Self {
        Self {
            state: State::Unknown,
            message: "not monitored".to_string(),
            response_time: None,
            last_checked: None,
        }
    }
}

/// A state or message transition for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Target name.
    pub name: String,
    /// New state.
    pub state: State,
    /// New message.
    pub message: String,
}

/// Notification delivered to the display layer.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A target's stored state or message changed.
    Changed(StatusChange),
    /// A container was autodiscovered and registered as a new target.
    Discovered {
        /// The synthesized target, including its display group.
        target: Target,
    },
}

/// Sending half of the event channel, held by the store.
pub type EventSender = mpsc::UnboundedSender<MonitorEvent>;

/// Receiving half of the event channel, owned by the display layer.
pub type StatusEvents = mpsc::UnboundedReceiver<MonitorEvent>;
