//! Exporter core.
//!
//! On every scrape the exporter walks the configured targets, resolves
//! each one to a probing module, runs the module's prober inside a fresh
//! per-target registry, and remaps the gathered output into the fixed set
//! of exported metric families.
//!
//! - [`Exporter`]: the `prometheus` collector driving the scrape
//! - [`descriptors`]: the closed set of exported families
//! - [`remap`]: raw-to-canonical metric translation

pub mod descriptors;

mod collector;
mod remap;

pub use collector::{Exporter, ScrapeError};
pub use descriptors::Descriptor;
pub use remap::RemapError;
