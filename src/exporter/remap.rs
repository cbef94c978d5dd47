//! Translation of prober-produced metric families into the exported shape.
//!
//! A prober registers metrics into its per-target registry with whatever
//! label order its metric vectors happen to use (the client library sorts
//! label pairs alphabetically when gathering). The remapper rebinds each
//! raw metric to its [`Descriptor`](super::descriptors::Descriptor),
//! reorders the label values into the canonical order, and accumulates one
//! output family per canonical name.

use std::collections::BTreeMap;

use prometheus::proto;
use thiserror::Error;

use super::descriptors::{self, Descriptor};

/// Canonical metrics accumulated over one scrape, keyed by family name.
pub type CanonicalFamilies = BTreeMap<&'static str, proto::MetricFamily>;

/// Why a single raw metric could not be bound to its descriptor.
#[derive(Debug, Error)]
pub enum RemapError {
    /// The raw metric carries no gauge value.
    #[error("metric is not a gauge")]
    NotAGauge,

    /// The raw label set does not match the descriptor's arity.
    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },
}

/// Remap every metric of a raw family into `out`.
///
/// Families whose name is not in the descriptor table are dropped with a
/// diagnostic; so are individual metrics that do not fit their descriptor.
/// Neither case aborts the scrape.
pub fn remap_family(raw: &proto::MetricFamily, out: &mut CanonicalFamilies) {
    let Some(desc) = descriptors::lookup(raw.get_name()) else {
        tracing::warn!(
            metric = raw.get_name(),
            "dropping metric family not in the exported set"
        );
        return;
    };

    for raw_metric in raw.get_metric() {
        match remap_metric(desc, raw_metric) {
            Ok(metric) => family_entry(out, desc).mut_metric().push(metric),
            Err(err) => {
                tracing::warn!(
                    metric = desc.name,
                    error = %err,
                    "dropping metric that does not fit its descriptor"
                );
            }
        }
    }
}

/// Append a canonical gauge built directly from label values.
///
/// Used for the collector-level gauges emitted on resolution failure, where
/// there is no sub-registry to gather from. The label values must already
/// be in the descriptor's canonical order.
pub fn push_canonical(
    out: &mut CanonicalFamilies,
    name: &str,
    label_values: &[&str],
    value: f64,
) {
    let Some(desc) = descriptors::lookup(name) else {
        tracing::warn!(metric = name, "not an exported metric family");
        return;
    };
    if label_values.len() != desc.labels.len() {
        tracing::warn!(
            metric = name,
            expected = desc.labels.len(),
            got = label_values.len(),
            "label arity mismatch"
        );
        return;
    }

    let mut metric = proto::Metric::default();
    for (label, value) in desc.labels.iter().zip(label_values) {
        let mut pair = proto::LabelPair::default();
        pair.set_name((*label).to_string());
        pair.set_value((*value).to_string());
        metric.mut_label().push(pair);
    }
    let mut gauge = proto::Gauge::default();
    gauge.set_value(value);
    metric.set_gauge(gauge);

    family_entry(out, desc).mut_metric().push(metric);
}

/// Bind one raw metric to its descriptor.
///
/// Rebinding is positional: the sorted label values are published under
/// the descriptor's label names. A foreign label that passes the arity
/// check therefore has its value exposed under the trailing descriptor
/// name rather than its own, matching the original exporter's const
/// metric construction.
fn remap_metric(desc: &Descriptor, raw: &proto::Metric) -> Result<proto::Metric, RemapError> {
    if !raw.has_gauge() {
        return Err(RemapError::NotAGauge);
    }
    if raw.get_label().len() != desc.labels.len() {
        return Err(RemapError::LabelCount {
            expected: desc.labels.len(),
            got: raw.get_label().len(),
        });
    }

    // Stable sort: labels the descriptor knows about take its order, the
    // rest keep their encounter order at the end.
    let mut pairs: Vec<&proto::LabelPair> = raw.get_label().iter().collect();
    pairs.sort_by_key(|pair| descriptors::label_rank(desc, pair.get_name()));

    let mut metric = proto::Metric::default();
    for (label, pair) in desc.labels.iter().zip(&pairs) {
        let mut out_pair = proto::LabelPair::default();
        out_pair.set_name((*label).to_string());
        out_pair.set_value(pair.get_value().to_string());
        metric.mut_label().push(out_pair);
    }
    let mut gauge = proto::Gauge::default();
    gauge.set_value(raw.get_gauge().get_value());
    metric.set_gauge(gauge);

    Ok(metric)
}

fn family_entry<'a>(
    out: &'a mut CanonicalFamilies,
    desc: &'static Descriptor,
) -> &'a mut proto::MetricFamily {
    out.entry(desc.name).or_insert_with(|| {
        let mut family = proto::MetricFamily::default();
        family.set_name(desc.name.to_string());
        family.set_help(desc.help.to_string());
        family.set_field_type(proto::MetricType::GAUGE);
        family
    })
}
