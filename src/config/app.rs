//! Application configuration structures.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prober::ProberKind;

use super::validation::{expand_env_vars, ConfigError};

/// Default probe timeout (10 seconds).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9219).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 9219,
        }
    }
}

/// TLS parameters shared by the handshake-based probers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM bundle of CA certificates to verify against. When unset, the
    /// bundled web PKI roots are used.
    pub ca_file: Option<PathBuf>,

    /// SNI / verification name. Defaults to the host part of the target.
    pub server_name: Option<String>,

    /// Skip certificate chain verification.
    pub insecure_skip_verify: bool,
}

/// A named probing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Which probing strategy to run.
    pub prober: ProberKind,

    /// Probe timeout (default: 10s). Enforced inside the prober; the
    /// exporter passes no deadline of its own.
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// TLS parameters for handshake-based probers.
    #[serde(default)]
    pub tls_config: TlsConfig,
}

impl Module {
    /// A module running the given prober with default parameters.
    pub fn new(prober: ProberKind) -> Self {
        Self {
            prober,
            timeout: DEFAULT_PROBE_TIMEOUT,
            tls_config: TlsConfig::default(),
        }
    }

    /// Set the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the TLS parameters.
    pub fn with_tls_config(mut self, tls_config: TlsConfig) -> Self {
        self.tls_config = tls_config;
        self
    }
}

/// A configured probe destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Network or resource address, prober-dependent (e.g. `host:port`
    /// for the TLS probers, a path for the file prober).
    pub target: String,

    /// Module to probe with. Empty or unset means the configured
    /// `default_module`.
    #[serde(default)]
    pub module: Option<String>,
}

impl Target {
    /// A target probed with the default module.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            module: None,
        }
    }

    /// Set the module name.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Module used for targets that do not name one.
    #[serde(default)]
    pub default_module: Option<String>,

    /// Probing modules by name.
    #[serde(default)]
    pub modules: HashMap<String, Module>,

    /// Scrape targets.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl AppConfig {
    /// Load configuration from a YAML file, expanding `${VAR}` references
    /// and validating the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(raw))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Only defects that can never produce a useful scrape are fatal here.
    /// A target referencing a module that does not exist is deliberately
    /// left to scrape time, where it is logged and skipped per target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(default) = &self.default_module {
            if !self.modules.contains_key(default) {
                return Err(ConfigError::Validation(format!(
                    "default_module {:?} is not defined in modules",
                    default
                )));
            }
        }

        for (name, module) in &self.modules {
            if module.timeout.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "module {:?} has a zero timeout",
                    name
                )));
            }
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.target.is_empty() {
                return Err(ConfigError::Validation(
                    "target address cannot be empty".to_string(),
                ));
            }
            let key = (&target.target, &target.module);
            if !seen.insert(key) {
                return Err(ConfigError::Validation(format!(
                    "duplicate target {:?}",
                    target.target
                )));
            }
            if let Some(module) = target.module.as_deref() {
                if !module.is_empty() && !self.modules.contains_key(module) {
                    tracing::warn!(
                        target = %target.target,
                        module = %module,
                        "target references an undefined module and will be skipped at scrape time"
                    );
                }
            }
        }

        Ok(())
    }
}
