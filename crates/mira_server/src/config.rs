//! Service configuration.
//!
//! Sources, in increasing precedence:
//! 1. Built-in defaults
//! 2. Optional `mira.toml` in the working directory
//! 3. `MIRA_*` environment variables (e.g. `MIRA_CHUNK_SIZE=8`)
//! 4. The deployment variables `PORT`, `VERSION` and `ROUTER_BASE_URL`
//!
//! A `.env.local` file, if present, is loaded into the environment first.

use crate::middleware::Throttle;
use crate::responder::{DEFAULT_RESPONSE_MODEL, ResponderConfig};
use config::{Config, Environment, File};
use mira_error::{ConfigError, MiraError, MiraResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration file read from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "mira.toml";

/// Environment file loaded before configuration is resolved.
pub const DEFAULT_ENV_FILE: &str = ".env.local";

/// Models advertised by `GET /v1/models` unless configured otherwise.
pub const DEFAULT_MODELS: [&str; 4] = [
    "openai/gpt-4o-mini",
    "openai/gpt-4o",
    "openrouter/anthropic/claude-3-haiku",
    "anthropic/claude-3-sonnet",
];

/// Configuration of the completion service.
///
/// # Example
///
/// ```toml
/// port = 9000
/// request_timeout_secs = 30
/// chunk_size = 8
/// models = ["openai/gpt-4o-mini"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ServiceConfig {
    /// Interface to bind
    host: String,
    /// Port to bind
    port: u16,
    /// Version reported by `/health`
    version: String,
    /// Base URL of the router this node reports to
    #[serde(default)]
    router_base_url: Option<String>,
    /// Whole-request deadline in seconds
    request_timeout_secs: u64,
    /// Simulated processing delay in milliseconds
    processing_delay_ms: u64,
    /// Pause between streamed chunks in milliseconds
    chunk_delay_ms: u64,
    /// Characters per streamed content chunk
    chunk_size: usize,
    /// Model name reported in responses
    response_model: String,
    /// Models listed by `/v1/models`
    models: Vec<String>,
    /// Time in-flight requests get to finish on shutdown, in seconds
    shutdown_grace_secs: u64,
    /// Requests handled at once
    max_in_flight: usize,
    /// Requests allowed to wait for a free slot
    max_backlog: usize,
    /// Longest wait for a free slot, in seconds
    backlog_timeout_secs: u64,
    /// Upper bound on producing any response, in seconds
    route_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            version: "0.0.0".to_string(),
            router_base_url: None,
            request_timeout_secs: 45,
            processing_delay_ms: 1000,
            chunk_delay_ms: 50,
            chunk_size: 5,
            response_model: DEFAULT_RESPONSE_MODEL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            shutdown_grace_secs: 30,
            max_in_flight: 1000,
            max_backlog: 200,
            backlog_timeout_secs: 60,
            route_timeout_secs: 120,
        }
    }
}

impl ServiceConfig {
    /// Load `.env.local`, then resolve configuration from the working
    /// directory and the process environment.
    pub fn load() -> MiraResult<Self> {
        load_env_file(DEFAULT_ENV_FILE)?;
        Self::from_sources(Some(Path::new(DEFAULT_CONFIG_FILE)), std::env::vars().collect())
    }

    /// Resolve configuration from a TOML file (required to exist) and defaults.
    pub fn from_file(path: impl AsRef<Path>) -> MiraResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MiraError::from(ConfigError::new(format!(
                "Configuration file not found: {}",
                path.display()
            ))));
        }
        Self::from_sources(Some(path), HashMap::new())
    }

    /// Resolve configuration from an optional file and an explicit
    /// environment map.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails
    /// [`ServiceConfig::validate`].
    #[instrument(skip_all)]
    pub fn from_sources(file: Option<&Path>, env: HashMap<String, String>) -> MiraResult<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(|e| {
            MiraError::from(ConfigError::new(format!("Failed to encode defaults: {}", e)))
        })?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = file {
            debug!("Adding optional configuration file");
            builder = builder.add_source(File::from(path).required(false));
        }

        let deployment = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();
        let port = deployment("PORT");
        let version = deployment("VERSION");
        let router_base_url = deployment("ROUTER_BASE_URL");

        let config: Self = builder
            .add_source(
                Environment::with_prefix("MIRA")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("models")
                    .source(Some(env.clone())),
            )
            .set_override_option("port", port)
            .and_then(|b| b.set_override_option("version", version))
            .and_then(|b| b.set_override_option("router_base_url", router_base_url))
            .and_then(|b| b.build())
            .map_err(|e| {
                MiraError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MiraError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> MiraResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::new("chunk_size must be greater than zero").into());
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::new("request_timeout_secs must be greater than zero").into());
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::new("max_in_flight must be greater than zero").into());
        }
        if self.route_timeout_secs == 0 {
            return Err(ConfigError::new("route_timeout_secs must be greater than zero").into());
        }
        if self.models.is_empty() {
            return Err(ConfigError::new("models must list at least one model").into());
        }
        Ok(())
    }

    /// Override the bind address.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whole-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Grace period for in-flight requests on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Upper bound on producing any response.
    pub fn route_timeout(&self) -> Duration {
        Duration::from_secs(self.route_timeout_secs)
    }

    /// Admission control derived from this configuration.
    pub fn throttle(&self) -> Throttle {
        Throttle::new(
            self.max_in_flight,
            self.max_backlog,
            Duration::from_secs(self.backlog_timeout_secs),
        )
    }

    /// Responder settings derived from this configuration.
    pub fn responder(&self) -> ResponderConfig {
        ResponderConfig::from(self)
    }
}

impl From<&ServiceConfig> for ResponderConfig {
    fn from(config: &ServiceConfig) -> Self {
        ResponderConfig::from_parts(
            config.response_model.clone(),
            config.chunk_size,
            Duration::from_millis(config.chunk_delay_ms),
            Duration::from_millis(config.processing_delay_ms),
        )
    }
}

/// Load `KEY=value` pairs from `path` into the process environment.
///
/// Returns whether the file was found. A missing file is not an error;
/// existing variables are not overwritten.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool, ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(ConfigError::new(format!(
            "Failed to load {}: {}",
            path.display(),
            e
        ))),
    }
}
