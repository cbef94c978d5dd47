//! Prober boundary.
//!
//! A prober inspects one certificate source (a TLS endpoint, a file on
//! disk, a Kubernetes secret, a kubeconfig) and registers whatever raw
//! metrics it produces into the per-target registry handed to it. The
//! exporter core treats probers as black boxes: it resolves one per
//! target, runs it, and remaps its output.
//!
//! The set of prober kinds is closed ([`ProberKind`]), so a module naming
//! an unknown kind is rejected when the configuration is parsed. Which
//! kinds actually have an implementation is decided at runtime through the
//! [`ProberTable`]; this crate ships the [`tcp::TcpProber`] and embedding
//! applications register the rest.

pub mod tcp;

use std::collections::HashMap;
use std::fmt;
use std::io;

use prometheus::Registry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Module;

pub use tcp::TcpProber;

/// The closed set of probing strategy identifiers a module may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProberKind {
    /// TLS handshake against a raw TCP endpoint.
    Tcp,
    /// TLS handshake through an HTTPS request.
    Https,
    /// Certificates parsed from files on disk.
    File,
    /// Certificates held in Kubernetes secrets.
    Kubernetes,
    /// Certificates embedded in a kubeconfig.
    Kubeconfig,
}

impl ProberKind {
    /// Label value used by the `ssl_prober` gauge.
    pub fn as_str(self) -> &'static str {
        match self {
            ProberKind::Tcp => "tcp",
            ProberKind::Https => "https",
            ProberKind::File => "file",
            ProberKind::Kubernetes => "kubernetes",
            ProberKind::Kubeconfig => "kubeconfig",
        }
    }
}

impl fmt::Display for ProberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a prober may surface. They never abort the scrape; the exporter
/// records them as `ssl_probe_success` = 0 and logs the detail.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Network I/O failure (connect, resolve, timeout).
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// TLS configuration or handshake failure.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// The target address could not be interpreted.
    #[error("invalid target {0:?}: {1}")]
    Target(String, String),

    /// Registering probe metrics into the per-target registry failed.
    #[error("failed to register probe metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// One probing strategy.
///
/// Implementations perform their own I/O and enforce their own timeout
/// from the module parameters; the exporter passes no deadline of its own.
pub trait Prober: Send + Sync {
    /// Probe `target` with the resolved module's parameters, registering
    /// raw metrics into `registry`.
    fn probe(&self, target: &str, module: &Module, registry: &Registry) -> Result<(), ProbeError>;
}

/// Lookup table from prober kind to implementation.
///
/// Kinds without a registered implementation are an explicit error branch
/// at scrape time, not a panic.
#[derive(Default)]
pub struct ProberTable {
    probers: HashMap<ProberKind, Box<dyn Prober>>,
}

impl ProberTable {
    /// An empty table. Useful for embedders that supply every prober.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table with the probers this crate implements.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(ProberKind::Tcp, Box::new(TcpProber));
        table
    }

    /// Register (or replace) the implementation for a kind.
    pub fn register(&mut self, kind: ProberKind, prober: Box<dyn Prober>) {
        self.probers.insert(kind, prober);
    }

    /// Look up the implementation for a kind.
    pub fn get(&self, kind: ProberKind) -> Option<&dyn Prober> {
        self.probers.get(&kind).map(Box::as_ref)
    }
}

impl fmt::Debug for ProberTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProberTable")
            .field("kinds", &self.probers.keys().collect::<Vec<_>>())
            .finish()
    }
}
