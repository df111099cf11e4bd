use crate::defaults;
use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory served under `/static`; disabled when unset.
    pub static_dir: Option<PathBuf>,
    /// Sample rate assumed for inbound audio when the client does not send one.
    pub default_sample_rate: u32,
}

/// Provider selection and HTTP behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub stt: SttBackend,
    /// Per-request timeout for provider calls. Requests are never retried.
    pub request_timeout_secs: u64,
    /// ElevenLabs voice id; the built-in default voice when unset.
    pub tts_voice: Option<String>,
    /// Parent directory for staged utterance audio; system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

/// Bearer authentication on the WebSocket route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SttBackend {
    #[default]
    ElevenLabs,
    AssemblyAi,
}

impl std::str::FromStr for SttBackend {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elevenlabs" => Ok(SttBackend::ElevenLabs),
            "assemblyai" => Ok(SttBackend::AssemblyAi),
            other => Err(RelayError::ConfigInvalidValue {
                key: "providers.stt".to_string(),
                message: format!("unknown backend '{}' (expected elevenlabs or assemblyai)", other),
            }),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::BIND_ADDR.to_string(),
            static_dir: None,
            default_sample_rate: defaults::INPUT_SAMPLE_RATE,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            stt: SttBackend::default(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            tts_voice: None,
            staging_dir: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(RelayError::from)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXRELAY_BIND → server.bind
    /// - VOXRELAY_STT_BACKEND → providers.stt
    /// - VOXRELAY_AUTH → auth.enabled
    ///
    /// Empty or unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bind) = std::env::var("VOXRELAY_BIND")
            && !bind.is_empty()
        {
            self.server.bind = bind;
        }

        if let Ok(backend) = std::env::var("VOXRELAY_STT_BACKEND")
            && !backend.is_empty()
        {
            match backend.parse() {
                Ok(backend) => self.providers.stt = backend,
                Err(e) => tracing::warn!("Ignoring VOXRELAY_STT_BACKEND: {}", e),
            }
        }

        if let Ok(auth) = std::env::var("VOXRELAY_AUTH")
            && !auth.is_empty()
        {
            match parse_bool(&auth) {
                Some(enabled) => self.auth.enabled = enabled,
                None => tracing::warn!("Ignoring VOXRELAY_AUTH: '{}' is not a boolean", auth),
            }
        }

        self
    }

    /// Check values that TOML cannot express constraints for.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(RelayError::ConfigInvalidValue {
                key: "server.bind".to_string(),
                message: format!("'{}' is not a socket address", self.server.bind),
            });
        }
        if self.server.default_sample_rate == 0 {
            return Err(RelayError::ConfigInvalidValue {
                key: "server.default_sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.providers.request_timeout_secs == 0 {
            return Err(RelayError::ConfigInvalidValue {
                key: "providers.request_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxrelay/config.toml on Linux, or a path relative
    /// to the working directory when no config directory is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxrelay")
            .join("config.toml")
    }
}
