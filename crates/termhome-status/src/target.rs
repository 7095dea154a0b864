//! Monitoring target descriptors.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default interval for ping and HTTP checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of ping packets.
pub const DEFAULT_PING_COUNT: u32 = 3;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default HTTP method.
pub const DEFAULT_HTTP_METHOD: &str = "HEAD";

/// A named thing whose health is tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Unique name.
    pub name: String,
    /// Display URL. Used as the ping host or HTTP URL when those are unset.
    #[serde(default)]
    pub href: Option<String>,
    /// Description shown below the name.
    #[serde(default)]
    pub description: Option<String>,
    /// Static status text (`ok`, `warning`, `critical`).
    #[serde(default)]
    pub status: Option<String>,
    /// Reachability check.
    #[serde(default)]
    pub ping: Option<PingSpec>,
    /// HTTP check.
    #[serde(default)]
    pub site_monitor: Option<HttpSpec>,
    /// Container name to follow through the runtime.
    #[serde(default)]
    pub container: Option<String>,
    /// Runtime server alias the container lives on.
    #[serde(default)]
    pub server: Option<String>,
    /// Skip monitoring entirely.
    #[serde(default)]
    pub disable_status: bool,
    /// Display group. Filled in by whoever loads the target.
    #[serde(skip)]
    pub group: Option<String>,
}

/// Reachability (ICMP ping) settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingSpec {
    /// Host to ping. Falls back to the target's href.
    #[serde(default)]
    pub host: Option<String>,
    /// Packets per check.
    #[serde(default)]
    pub count: Option<u32>,
    /// Seconds between checks.
    #[serde(default)]
    pub interval: Option<u64>,
}

impl PingSpec {
    /// Ping a specific host.
    #[must_use]
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Packets per check, defaulting to [`DEFAULT_PING_COUNT`].
    #[must_use]
    pub fn effective_count(&self) -> u32 {
        self.count.filter(|c| *c > 0).unwrap_or(DEFAULT_PING_COUNT)
    }
}

/// HTTP site monitoring settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSpec {
    /// URL to check. Falls back to the target's href.
    #[serde(default)]
    pub url: Option<String>,
    /// HTTP method.
    #[serde(default)]
    pub method: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Seconds between checks.
    #[serde(default)]
    pub interval: Option<u64>,
    /// Status codes that count as up.
    #[serde(default)]
    pub expected_codes: Vec<u16>,
    /// Extra request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub skip_verify: bool,
}

impl HttpSpec {
    /// Check a specific URL.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the expected status codes.
    #[must_use]
    pub fn with_expected_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.expected_codes = codes.into();
        self
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Method to use, defaulting to [`DEFAULT_HTTP_METHOD`].
    #[must_use]
    pub fn effective_method(&self) -> &str {
        self.method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_HTTP_METHOD)
    }

    /// Timeout to use, defaulting to [`DEFAULT_HTTP_TIMEOUT`].
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| *t > 0)
            .map_or(DEFAULT_HTTP_TIMEOUT, Duration::from_secs)
    }

    /// Codes that count as up, defaulting to `[200]`.
    #[must_use]
    pub fn effective_expected_codes(&self) -> Vec<u16> {
        if self.expected_codes.is_empty() {
            vec![200]
        } else {
            self.expected_codes.clone()
        }
    }
}

/// How a target is monitored, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monitoring {
    /// Scheduled ping task.
    Ping,
    /// Scheduled HTTP task.
    Http,
    /// Driven by the container reconciler.
    Container,
    /// Seeded once from the static status string.
    Static,
    /// Registered but never polled.
    Inert,
}

impl Target {
    /// Create a target with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the display URL.
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Monitor with ping.
    #[must_use]
    pub fn with_ping(mut self, ping: PingSpec) -> Self {
        self.ping = Some(ping);
        self
    }

    /// Monitor with HTTP.
    #[must_use]
    pub fn with_site_monitor(mut self, site_monitor: HttpSpec) -> Self {
        self.site_monitor = Some(site_monitor);
        self
    }

    /// Follow a container on the given runtime server.
    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>, server: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self.server = Some(server.into());
        self
    }

    /// Set a static status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the display group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Container reference, if one is declared and non-empty.
    #[must_use]
    pub fn container_ref(&self) -> Option<&str> {
        self.container.as_deref().filter(|c| !c.is_empty())
    }

    /// Static status text, if one is declared and non-empty.
    #[must_use]
    pub fn static_status(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }

    /// The primary monitoring mode. Ping beats HTTP beats container.
    #[must_use]
    pub fn monitoring(&self) -> Monitoring {
        if self.ping.is_some() {
            Monitoring::Ping
        } else if self.site_monitor.is_some() {
            Monitoring::Http
        } else if self.container_ref().is_some() {
            Monitoring::Container
        } else if self.static_status().is_some() {
            Monitoring::Static
        } else {
            Monitoring::Inert
        }
    }

    /// Host to ping: the explicit host, else the href's host part.
    #[must_use]
    pub fn effective_host(&self) -> Option<String> {
        let explicit = self
            .ping
            .as_ref()
            .and_then(|p| p.host.as_deref())
            .filter(|h| !h.is_empty());
        if let Some(host) = explicit {
            return Some(host.to_string());
        }

        let href = self.href.as_deref().filter(|h| !h.is_empty())?;
        let host = host_from_href(href);
        (!host.is_empty()).then(|| host.to_string())
    }

    /// URL to check: the explicit URL, else the href.
    #[must_use]
    pub fn effective_url(&self) -> Option<String> {
        self.site_monitor
            .as_ref()
            .and_then(|s| s.url.as_deref())
            .filter(|u| !u.is_empty())
            .or_else(|| self.href.as_deref().filter(|h| !h.is_empty()))
            .map(str::to_string)
    }
}

/// Strip scheme, path and port from an http(s) URL. Other strings pass through.
fn host_from_href(href: &str) -> &str {
    if !href.starts_with("http") {
        return href;
    }
    let rest = href
        .strip_prefix("http://")
        .or_else(|| href.strip_prefix("https://"))
        .unwrap_or(href);
    let authority = rest.split('/').next().unwrap_or(rest);
    authority.split(':').next().unwrap_or(authority)
}
