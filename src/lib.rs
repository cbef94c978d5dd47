//! sslwatch - Multi-target SSL/TLS certificate metrics exporter.
//!
//! On every scrape, each configured target is resolved to a named probing
//! module, the module's prober runs inside an isolated per-target
//! registry, and the raw metrics it produced are remapped into a fixed,
//! versioned set of exported metric families with canonical label
//! ordering.
//!
//! # Architecture
//!
//! - [`exporter`]: scrape orchestration, descriptor registry, remapping
//! - [`prober`]: the probing-strategy boundary and the built-in TCP prober
//! - [`config`]: YAML configuration for modules, targets and the server
//! - [`server`]: the `/metrics` HTTP endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use prometheus::Registry;
//! use sslwatch::{AppConfig, Exporter, ProberTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/sslwatch.yaml")?;
//! let exporter = Exporter::new(&config, ProberTable::builtin())?;
//!
//! let registry = Registry::new();
//! registry.register(Box::new(exporter))?;
//! // serve `registry` on /metrics
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod exporter;
pub mod prober;
pub mod server;

pub use config::{AppConfig, ConfigError, Module, Target, TlsConfig};
pub use exporter::{Exporter, ScrapeError};
pub use prober::{ProbeError, Prober, ProberKind, ProberTable};
