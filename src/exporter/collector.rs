//! Per-target scrape orchestration.

use std::collections::HashMap;
use std::sync::Mutex;

use prometheus::core::{Collector, Desc};
use prometheus::proto;
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use thiserror::Error;

use crate::config::{AppConfig, Module, Target};
use crate::prober::{Prober, ProberKind, ProberTable};

use super::descriptors::{self, PROBER, PROBE_SUCCESS};
use super::remap::{self, CanonicalFamilies};

/// Why a target could not be scraped at all. Per target and non-fatal:
/// the target is skipped for this scrape and the error is logged.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// No module requested and no default module configured.
    #[error("module parameter must be set")]
    MissingModule,

    /// The requested module is not defined.
    #[error("unknown module {0:?}")]
    UnknownModule(String),

    /// The module's prober kind has no registered implementation.
    #[error("no prober registered for kind {0:?}")]
    UnknownProber(ProberKind),

    /// Setting up the per-target registry failed.
    #[error("registry setup failed: {0}")]
    Registry(#[from] prometheus::Error),
}

/// Multi-target SSL/TLS metrics collector.
///
/// Implements [`prometheus::core::Collector`]; register it into the
/// registry served on the scrape endpoint. The whole `collect` pass runs
/// under an exclusive lock, so concurrent scrape requests serialize. A
/// slow or unreachable target therefore delays the remainder of the
/// scrape; that latency is the accepted cost of probing synchronously and
/// sequentially.
pub struct Exporter {
    scrape_lock: Mutex<()>,
    targets: Vec<Target>,
    modules: HashMap<String, Module>,
    default_module: Option<String>,
    probers: ProberTable,
    descs: Vec<Desc>,
}

impl Exporter {
    /// Build an exporter from loaded configuration and a prober table.
    pub fn new(config: &AppConfig, probers: ProberTable) -> Result<Self, prometheus::Error> {
        let descs = descriptors::DESCRIPTORS
            .iter()
            .map(|d| {
                Desc::new(
                    d.name.to_string(),
                    d.help.to_string(),
                    d.labels.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            scrape_lock: Mutex::new(()),
            targets: config.targets.clone(),
            modules: config.modules.clone(),
            default_module: config.default_module.clone(),
            probers,
            descs,
        })
    }

    /// Resolve a target to its module and prober. Pure lookup.
    fn resolve(&self, target: &Target) -> Result<(&Module, &dyn Prober), ScrapeError> {
        let module_name = match target.module.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self
                .default_module
                .as_deref()
                .ok_or(ScrapeError::MissingModule)?,
        };

        let module = self
            .modules
            .get(module_name)
            .ok_or_else(|| ScrapeError::UnknownModule(module_name.to_string()))?;

        let prober = self
            .probers
            .get(module.prober)
            .ok_or(ScrapeError::UnknownProber(module.prober))?;

        Ok((module, prober))
    }

    /// Scrape one target, accumulating canonical metrics into `out`.
    fn scrape_target(&self, target: &Target, out: &mut CanonicalFamilies) -> bool {
        let (module, prober) = match self.resolve(target) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!(target = %target.target, error = %err, "skipping target");
                // Collection failure is signalled through the success
                // gauge's value, never by omitting it.
                remap::push_canonical(out, PROBE_SUCCESS, &[], 0.0);
                if let ScrapeError::UnknownProber(kind) = err {
                    remap::push_canonical(out, PROBER, &[kind.as_str()], 0.0);
                }
                return false;
            }
        };

        let (families, ok) = match self.probe_target(target, module, prober) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(target = %target.target, error = %err, "scrape setup failed");
                remap::push_canonical(out, PROBE_SUCCESS, &[], 0.0);
                return false;
            }
        };

        for family in &families {
            remap::remap_family(family, out);
        }
        ok
    }

    /// Run the prober against a fresh sub-registry and gather its output.
    ///
    /// The registry is exclusively owned here and discarded once gathered,
    /// so one target's probe can never leak metrics into another's.
    fn probe_target(
        &self,
        target: &Target,
        module: &Module,
        prober: &dyn Prober,
    ) -> Result<(Vec<proto::MetricFamily>, bool), ScrapeError> {
        let registry = Registry::new();

        // Registered before the prober runs so its own registrations
        // cannot collide with the collector-level gauges.
        let probe_success = Gauge::new(PROBE_SUCCESS, "If the probe was a success")?;
        let prober_used = GaugeVec::new(
            Opts::new(
                PROBER,
                "The prober used by the exporter to connect to the target",
            ),
            &["prober"],
        )?;
        registry.register(Box::new(probe_success.clone()))?;
        registry.register(Box::new(prober_used.clone()))?;
        prober_used
            .with_label_values(&[module.prober.as_str()])
            .set(1.0);

        let ok = match prober.probe(&target.target, module, &registry) {
            Ok(()) => {
                tracing::debug!(target = %target.target, prober = %module.prober, "probe succeeded");
                probe_success.set(1.0);
                true
            }
            Err(err) => {
                tracing::error!(
                    target = %target.target,
                    prober = %module.prober,
                    error = %err,
                    "probe failed"
                );
                probe_success.set(0.0);
                false
            }
        };

        Ok((registry.gather(), ok))
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("targets", &self.targets.len())
            .field("modules", &self.modules.len())
            .field("default_module", &self.default_module)
            .finish_non_exhaustive()
    }
}

impl Collector for Exporter {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        // One scrape at a time; a concurrent scrape blocks here until the
        // running one finishes.
        let _scrape = self
            .scrape_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut out = CanonicalFamilies::new();
        for target in &self.targets {
            self.scrape_target(target, &mut out);
        }
        out.into_values().collect()
    }
}
