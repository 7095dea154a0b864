//! HTTP probe.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, redirect};

use super::ProbeOutcome;
use crate::state::State;
use crate::target::{HttpSpec, Target};

/// User agent sent with every check.
pub const USER_AGENT: &str = concat!("termhome/", env!("CARGO_PKG_VERSION"));

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// One HTTP check, fully resolved from a target.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: Option<String>,
    method: String,
    expected_codes: Vec<u16>,
    headers: HashMap<String, String>,
    /// Built once and reused by every check; holds the build error otherwise.
    client: Result<Client, String>,
}

impl HttpProbe {
    /// Resolve URL and defaults from a target's site monitor settings.
    #[must_use]
    pub fn from_target(target: &Target) -> Self {
        let spec = target.site_monitor.clone().unwrap_or_default();
        Self::from_spec(target.effective_url(), &spec)
    }

    /// Build a probe for `url` using `spec` for everything else.
    #[must_use]
    pub fn from_spec(url: Option<String>, spec: &HttpSpec) -> Self {
        let timeout = spec.effective_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(spec.skip_verify)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.to_string());

        Self {
            url,
            method: spec.effective_method().to_ascii_uppercase(),
            expected_codes: spec.effective_expected_codes(),
            headers: spec.headers.clone(),
            client,
        }
    }

    /// Run the check.
    pub async fn check(&self) -> ProbeOutcome {
        let Some(url) = self.url.as_deref() else {
            return ProbeOutcome::critical("No URL specified for HTTP check");
        };

        let method = match Method::from_bytes(self.method.as_bytes()) {
            Ok(method) => method,
            Err(e) => return ProbeOutcome::critical(format!("Invalid request: {e}")),
        };

        let client = match &self.client {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::critical(format!("Invalid request: {e}")),
        };

        let mut request = client.request(method, url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        tracing::debug!(url, method = %self.method, "Sending HTTP check");
        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "HTTP check failed");
                return ProbeOutcome::critical(format!("Request failed: {e}"));
            }
        };
        let elapsed = start.elapsed();

        let code = response.status().as_u16();
        tracing::debug!(url, code, elapsed_ms = elapsed.as_millis(), "HTTP check answered");
        self.classify(code, elapsed)
    }

    /// Classify a response code.
    #[must_use]
    pub fn classify(&self, code: u16, elapsed: Duration) -> ProbeOutcome {
        if self.expected_codes.contains(&code) {
            ProbeOutcome::new(State::Ok, format!("Up ({} ms)", elapsed.as_millis()))
                .with_latency(elapsed)
        } else if code >= 500 {
            ProbeOutcome::critical(format!("Server error: {code}"))
        } else if code >= 400 {
            ProbeOutcome::new(State::Warning, format!("Client error: {code}"))
        } else {
            ProbeOutcome::new(State::Warning, format!("Unexpected response: {code}"))
        }
    }
}
