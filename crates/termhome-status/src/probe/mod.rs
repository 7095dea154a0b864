//! Probe strategies.
//!
//! Each probe runs one check and returns a [`ProbeOutcome`]. Probes never
//! touch shared state and never fail: transport problems become `Critical`
//! outcomes. Persisting the outcome is the caller's job.

pub mod container;
pub mod http;
pub mod ping;

use std::time::Duration;

use crate::state::State;

pub use container::classify_container;
pub use http::HttpProbe;
pub use ping::PingProbe;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Classified state.
    pub state: State,
    /// Human-readable detail.
    pub message: String,
    /// Measured latency, when the check got far enough to measure one.
    pub latency: Option<Duration>,
}

impl ProbeOutcome {
    /// Create an outcome without latency.
    #[must_use]
    pub fn new(state: State, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            latency: None,
        }
    }

    /// Shorthand for a `Critical` outcome.
    #[must_use]
    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(State::Critical, message)
    }

    /// Attach a latency.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}
