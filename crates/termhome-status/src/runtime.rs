//! Container runtime access.
//!
//! The reconciler only needs to list containers, so the runtime is a small
//! trait. [`DockerClient`] implements it against the Docker Engine API over a
//! unix socket or plain TCP. Connections are not kept between calls.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use termhome_common::{TermhomeError, TermhomeResult};

/// Default Docker socket.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Server alias for containers on the local runtime.
pub const LOCAL_SERVER: &str = "local-docker";

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout for a single runtime API call.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Container runtime connection and reconciliation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Unix socket path.
    #[serde(default)]
    pub socket: Option<PathBuf>,
    /// Remote host.
    #[serde(default)]
    pub host: Option<String>,
    /// Remote port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Seconds between reconciliation cycles.
    #[serde(default)]
    pub interval: Option<u64>,
    /// Container name patterns to include. Not enforced.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Container name patterns to exclude. Not enforced.
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Turn off label-based autodiscovery.
    #[serde(default)]
    pub disable_autodiscovery: bool,
}

impl RuntimeConfig {
    /// Connect through a unix socket.
    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// Connect to a remote host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>, port: Option<u16>) -> Self {
        self.host = Some(host.into());
        self.port = port;
        self
    }

    /// Set the reconciliation interval in seconds.
    #[must_use]
    pub const fn with_interval(mut self, seconds: u64) -> Self {
        self.interval = Some(seconds);
        self
    }

    /// Disable autodiscovery.
    #[must_use]
    pub const fn without_autodiscovery(mut self) -> Self {
        self.disable_autodiscovery = true;
        self
    }

    /// Interval between cycles, defaulting to 60 seconds.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.interval
            .filter(|i| *i > 0)
            .map_or(DEFAULT_RECONCILE_INTERVAL, Duration::from_secs)
    }

    /// Where to connect: socket, then host, then `DOCKER_HOST`, then the
    /// default socket.
    #[must_use]
    pub fn endpoint(&self) -> DockerEndpoint {
        if let Some(socket) = self.socket.as_ref().filter(|s| !s.as_os_str().is_empty()) {
            return DockerEndpoint::Unix(socket.clone());
        }
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            let authority = match self.port.filter(|p| *p > 0) {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            return DockerEndpoint::Tcp(authority);
        }
        std::env::var("DOCKER_HOST")
            .ok()
            .and_then(|value| DockerEndpoint::parse(&value))
            .unwrap_or_else(|| DockerEndpoint::Unix(PathBuf::from(DEFAULT_SOCKET)))
    }
}

/// Docker Engine API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Local unix socket.
    Unix(PathBuf),
    /// `host:port` reachable over plain HTTP.
    Tcp(String),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST` style value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(path) = value.strip_prefix("unix://") {
            Some(Self::Unix(PathBuf::from(path)))
        } else if let Some(authority) = value
            .strip_prefix("tcp://")
            .or_else(|| value.strip_prefix("http://"))
        {
            Some(Self::Tcp(authority.trim_end_matches('/').to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(authority) => write!(f, "tcp://{authority}"),
        }
    }
}

/// Health reported by the container's own healthcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    /// Healthcheck passing.
    Healthy,
    /// Healthcheck failing.
    Unhealthy,
    /// Healthcheck has not settled yet.
    Starting,
    /// No healthcheck, or container not running.
    #[default]
    None,
}

impl Health {
    /// Derive health from the runtime's state and status text.
    #[must_use]
    pub fn from_status(state: &str, status: &str) -> Self {
        if state != "running" || status.is_empty() {
            Self::None
        } else if status.contains("(healthy)") {
            Self::Healthy
        } else if status.contains("(unhealthy)") {
            Self::Unhealthy
        } else if status.contains("(health: starting)") {
            Self::Starting
        } else {
            Self::None
        }
    }
}

/// One live container as seen in a single listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    /// Runtime identifier.
    pub id: String,
    /// Name without the leading `/`.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Raw status text, e.g. "Up 2 hours (healthy)".
    pub status: String,
    /// Derived health.
    pub health: Health,
    /// Container labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSnapshot {
    /// A container with only a name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the status text and derive health as a running container would.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        let state = if self.status.starts_with("Up") { "running" } else { "exited" };
        self.health = Health::from_status(state, &self.status);
        self
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

/// Source of live container inventory.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Human-readable endpoint for logs and errors.
    fn endpoint(&self) -> String;

    /// Check that the runtime answers.
    async fn ping(&self) -> TermhomeResult<()>;

    /// List all containers, running and stopped.
    async fn list_containers(&self) -> TermhomeResult<Vec<ContainerSnapshot>>;
}

/// Entry of `GET /containers/json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

impl From<ApiContainer> for ContainerSnapshot {
    fn from(api: ApiContainer) -> Self {
        let name = api
            .names
            .first()
            .map(|n| n.strip_prefix('/').unwrap_or(n).to_string())
            .unwrap_or_else(|| api.id.chars().take(12).collect());
        Self {
            health: Health::from_status(&api.state, &api.status),
            id: api.id,
            name,
            image: api.image,
            status: api.status,
            labels: api.labels.unwrap_or_default(),
        }
    }
}

/// Host used in request URLs when talking over a unix socket.
const SOCKET_AUTHORITY: &str = "docker";

/// Docker Engine API client.
#[derive(Debug, Clone)]
pub struct DockerClient {
    endpoint: DockerEndpoint,
    base_url: String,
    http: reqwest::Client,
}

impl DockerClient {
    /// Client for the endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built for the endpoint.
    pub fn from_config(config: &RuntimeConfig) -> TermhomeResult<Self> {
        Self::new(config.endpoint())
    }

    /// Client for an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built for the endpoint.
    pub fn new(endpoint: DockerEndpoint) -> TermhomeResult<Self> {
        let builder = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .pool_max_idle_per_host(0);

        let (builder, base_url) = match &endpoint {
            DockerEndpoint::Unix(socket) => (
                with_unix_socket(builder, socket)?,
                format!("http://{SOCKET_AUTHORITY}"),
            ),
            DockerEndpoint::Tcp(authority) => (builder, format!("http://{authority}")),
        };

        let http = builder.build().map_err(|e| TermhomeError::Runtime {
            message: format!("cannot build client for {endpoint}: {e}"),
        })?;

        Ok(Self {
            endpoint,
            base_url,
            http,
        })
    }

    fn unreachable(&self, reason: impl fmt::Display) -> TermhomeError {
        TermhomeError::RuntimeUnreachable {
            endpoint: self.endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `GET path`, returning status code and body.
    async fn get(&self, path: &str) -> TermhomeResult<(u16, Vec<u8>)> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(endpoint = %self.endpoint, path, "Runtime API request");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                self.unreachable(format!("no answer within {}s", API_TIMEOUT.as_secs()))
            } else {
                self.unreachable(e)
            }
        })?;
        let code = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.unreachable(e))?;
        Ok((code, body.to_vec()))
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)]
fn with_unix_socket(
    builder: reqwest::ClientBuilder,
    socket: &Path,
) -> TermhomeResult<reqwest::ClientBuilder> {
    Ok(builder.unix_socket(socket))
}

#[cfg(not(unix))]
fn with_unix_socket(
    _builder: reqwest::ClientBuilder,
    socket: &Path,
) -> TermhomeResult<reqwest::ClientBuilder> {
    Err(TermhomeError::RuntimeUnreachable {
        endpoint: format!("unix://{}", socket.display()),
        reason: "unix sockets are not supported on this platform".to_string(),
    })
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    async fn ping(&self) -> TermhomeResult<()> {
        let (code, _) = self.get("/_ping").await?;
        if code == 200 {
            Ok(())
        } else {
            Err(self.unreachable(format!("ping answered {code}")))
        }
    }

    async fn list_containers(&self) -> TermhomeResult<Vec<ContainerSnapshot>> {
        let (code, body) = self.get("/containers/json?all=1").await?;
        if code != 200 {
            return Err(TermhomeError::Runtime {
                message: format!(
                    "container list answered {code}: {}",
                    String::from_utf8_lossy(&body).trim()
                ),
            });
        }
        let containers: Vec<ApiContainer> = serde_json::from_slice(&body)?;
        Ok(containers.into_iter().map(ContainerSnapshot::from).collect())
    }
}
