//! Reachability probe backed by the system `ping` binary.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use super::ProbeOutcome;
use crate::state::State;

/// `rtt min/avg/max/mdev = 0.083/0.153/0.223/0.070 ms` (Linux) and
/// `round-trip min/avg/max/stddev = 27.2/32.5/41.8/5.1 ms` (macOS).
static UNIX_AVG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:rtt|round-trip) min/avg/max(?:/\w+)? = [0-9.]+/([0-9.]+)/")
        .expect("static regex")
});

static UNIX_LOSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)% packet loss").expect("static regex"));

static WINDOWS_AVG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Average = (\d+)ms").expect("static regex"));

static WINDOWS_LOSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)% loss").expect("static regex"));

/// Output dialect and argument style of the host's `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPlatform {
    /// iputils / BSD style output.
    Unix,
    /// `ping.exe` output.
    Windows,
    /// No known `ping` invocation.
    Unsupported(&'static str),
}

impl PingPlatform {
    /// Platform of the running process.
    #[must_use]
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" | "macos" => Self::Unix,
            "windows" => Self::Windows,
            other => Self::Unsupported(other),
        }
    }

    /// Arguments for `count` packets with a one second per-packet timeout.
    fn args(self, count: u32) -> Option<Vec<String>> {
        match self {
            Self::Unix => Some(vec![
                "-c".to_string(),
                count.to_string(),
                "-W".to_string(),
                "1".to_string(),
            ]),
            Self::Windows => Some(vec![
                "-n".to_string(),
                count.to_string(),
                "-w".to_string(),
                "1000".to_string(),
            ]),
            Self::Unsupported(_) => None,
        }
    }
}

/// Values extracted from ping output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingStats {
    /// Packet loss in percent.
    pub loss_percent: Option<f64>,
    /// Average round trip in milliseconds.
    pub avg_ms: Option<f64>,
}

/// Best-effort extraction of loss and average latency.
#[must_use]
pub fn parse_ping_output(platform: PingPlatform, output: &str) -> PingStats {
    let (avg_re, loss_re) = match platform {
        PingPlatform::Windows => (&*WINDOWS_AVG, &*WINDOWS_LOSS),
        _ => (&*UNIX_AVG, &*UNIX_LOSS),
    };
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    PingStats {
        loss_percent: capture(loss_re),
        avg_ms: capture(avg_re),
    }
}

/// Classify ping output.
///
/// `elapsed` stands in for the average when none can be parsed. `exit_ok`
/// only matters when the loss figure is missing.
#[must_use]
pub fn classify_ping(
    platform: PingPlatform,
    output: &str,
    elapsed: Duration,
    exit_ok: bool,
) -> ProbeOutcome {
    let stats = parse_ping_output(platform, output);

    let (avg_text, latency) = match stats.avg_ms {
        Some(avg) => (
            format!("{avg}ms"),
            Duration::try_from_secs_f64(avg / 1000.0).unwrap_or(elapsed),
        ),
        None => (format!("{:.1}ms", elapsed.as_secs_f64() * 1000.0), elapsed),
    };

    match stats.loss_percent {
        None if !exit_ok => ProbeOutcome::critical("Ping failed: no reply"),
        None => ProbeOutcome::new(State::Ok, format!("Up ({avg_text})")).with_latency(latency),
        Some(loss) if loss <= 0.0 => {
            ProbeOutcome::new(State::Ok, format!("Up ({avg_text})")).with_latency(latency)
        }
        Some(loss) if loss >= 100.0 => ProbeOutcome::critical(format!("Down ({loss}% loss)")),
        Some(loss) => ProbeOutcome::new(
            State::Warning,
            format!("Degraded ({avg_text}) packet loss: {loss}%"),
        )
        .with_latency(latency),
    }
}

/// One reachability check against a host.
#[derive(Debug, Clone)]
pub struct PingProbe {
    host: Option<String>,
    count: u32,
}

impl PingProbe {
    /// Probe `host` with `count` packets.
    #[must_use]
    pub const fn new(host: Option<String>, count: u32) -> Self {
        Self { host, count }
    }

    /// Run the check.
    pub async fn check(&self) -> ProbeOutcome {
        let Some(host) = self.host.as_deref() else {
            return ProbeOutcome::critical("No host specified for ping");
        };

        let platform = PingPlatform::current();
        let Some(args) = platform.args(self.count) else {
            let os = std::env::consts::OS;
            return ProbeOutcome::new(State::Warning, format!("Ping not supported on {os}"));
        };

        tracing::debug!(host, count = self.count, "Running ping");

        // Each packet waits at most a second; leave headroom for DNS.
        let budget = Duration::from_secs(u64::from(self.count) * 2 + 5);
        let start = Instant::now();
        let mut command = Command::new("ping");
        command.args(&args).arg(host).kill_on_drop(true);

        let output = match tokio::time::timeout(budget, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(host, error = %e, "Failed to run ping");
                return ProbeOutcome::critical(format!("Ping failed: {e}"));
            }
            Err(_) => {
                return ProbeOutcome::critical(format!(
                    "Ping failed: timed out after {}s",
                    budget.as_secs()
                ));
            }
        };
        let elapsed = start.elapsed();

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::trace!(host, output = %text, "Ping output");

        let stats = parse_ping_output(platform, &text);
        if stats.avg_ms.is_none() {
            tracing::debug!(host, "Could not extract average latency, using elapsed time");
        }

        classify_ping(platform, &text, elapsed, output.status.success())
    }
}
