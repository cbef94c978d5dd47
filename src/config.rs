//! Configuration module for the sslwatch exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Probing modules (prober kind, timeout, TLS parameters)
//! - Scrape targets and the optional default module

mod app;
mod validation;

pub use app::{AppConfig, Module, ServerConfig, Target, TlsConfig, DEFAULT_PROBE_TIMEOUT};
pub use validation::{expand_env_vars, ConfigError};
