//! Pieces shared by every provider backend: the credential that makes up the
//! two-phase `initialize()` lifecycle and the HTTP client settings.

use crate::defaults;
use crate::error::{Result, RelayError};
use std::sync::OnceLock;
use std::time::Duration;

/// An API secret read from the environment on first `initialize()`.
///
/// Construction never touches the environment, so a missing variable is a
/// `Configuration` error at initialize time rather than at process start.
/// Once loaded the value is kept; further `initialize()` calls are no-ops.
#[derive(Debug)]
pub struct Credential {
    var: String,
    value: OnceLock<String>,
}

impl Credential {
    /// Credential backed by the environment variable `var`.
    pub fn from_env(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: OnceLock::new(),
        }
    }

    /// Credential with a fixed value, already initialized.
    pub fn fixed(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            value: OnceLock::from(value.into()),
        }
    }

    /// Name of the backing environment variable.
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Loads the secret if not loaded yet. Missing or empty → `Configuration`.
    pub fn initialize(&self) -> Result<()> {
        if self.value.get().is_some() {
            return Ok(());
        }
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => {
                // Losing a race against another initialize() keeps the first value.
                self.value.get_or_init(|| value);
                Ok(())
            }
            _ => Err(RelayError::missing_env(&self.var)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }

    /// The secret, or `InvalidState` if `initialize()` has not succeeded.
    pub fn get(&self, provider: &str) -> Result<&str> {
        self.value
            .get()
            .map(String::as_str)
            .ok_or_else(|| RelayError::not_initialized(provider))
    }
}

/// HTTP settings shared by provider backends.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout. No retries are attempted on expiry.
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl HttpSettings {
    /// Builds a `reqwest` client honouring these settings.
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| RelayError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })
    }
}

/// Reads a response body for error messages, tolerating unreadable bodies.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.is_empty() => format!("HTTP {}: {}", status, body),
        _ => format!("HTTP {}", status),
    }
}
