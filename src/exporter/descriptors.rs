//! The closed set of metric families this exporter promises to consumers.
//!
//! Every family exposed on the scrape endpoint is declared here, together
//! with its help text and canonical label order. Probers register whatever
//! metrics they like into their per-target registry; anything whose name is
//! not in this table is dropped before it reaches the scrape response.
//! Extending the exported surface means adding an entry here, which is a
//! reviewed contract change rather than something a prober can do at
//! runtime.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Family name for the per-target probe outcome gauge.
pub const PROBE_SUCCESS: &str = "ssl_probe_success";

/// Family name for the per-target prober identity gauge.
pub const PROBER: &str = "ssl_prober";

/// Shape of one externally exported metric family.
///
/// `labels` is the canonical label order for the family. The remapper sorts
/// a raw metric's labels by their position in this list, so the order here
/// is a compatibility contract, not a cosmetic choice.
#[derive(Debug)]
pub struct Descriptor {
    /// Fully qualified metric name.
    pub name: &'static str,
    /// Help text, verbatim in the exposition output.
    pub help: &'static str,
    /// Label names in canonical order.
    pub labels: &'static [&'static str],
}

const CERT_LABELS: &[&str] = &[
    "serial_no",
    "issuer_cn",
    "cn",
    "dnsnames",
    "ips",
    "emails",
    "ou",
];

const VERIFIED_CERT_LABELS: &[&str] = &[
    "chain_no",
    "serial_no",
    "issuer_cn",
    "cn",
    "dnsnames",
    "ips",
    "emails",
    "ou",
];

const FILE_CERT_LABELS: &[&str] = &[
    "file",
    "serial_no",
    "issuer_cn",
    "cn",
    "dnsnames",
    "ips",
    "emails",
    "ou",
];

const KUBERNETES_CERT_LABELS: &[&str] = &[
    "namespace",
    "secret",
    "key",
    "serial_no",
    "issuer_cn",
    "cn",
    "dnsnames",
    "ips",
    "emails",
    "ou",
];

const KUBECONFIG_CERT_LABELS: &[&str] = &[
    "kubeconfig",
    "name",
    "type",
    "serial_no",
    "issuer_cn",
    "cn",
    "dnsnames",
    "ips",
    "emails",
    "ou",
];

/// All exported metric families.
pub static DESCRIPTORS: &[Descriptor] = &[
    Descriptor {
        name: PROBE_SUCCESS,
        help: "If the probe was a success",
        labels: &[],
    },
    Descriptor {
        name: PROBER,
        help: "The prober used by the exporter to connect to the target",
        labels: &["prober"],
    },
    Descriptor {
        name: "ssl_tls_version_info",
        help: "The TLS version used",
        labels: &["version"],
    },
    Descriptor {
        name: "ssl_cert_not_after",
        help: "NotAfter expressed as a Unix Epoch Time",
        labels: CERT_LABELS,
    },
    Descriptor {
        name: "ssl_cert_not_before",
        help: "NotBefore expressed as a Unix Epoch Time",
        labels: CERT_LABELS,
    },
    Descriptor {
        name: "ssl_verified_cert_not_after",
        help: "NotAfter expressed as a Unix Epoch Time",
        labels: VERIFIED_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_verified_cert_not_before",
        help: "NotBefore expressed as a Unix Epoch Time",
        labels: VERIFIED_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_ocsp_response_stapled",
        help: "If the connection state contains a stapled OCSP response",
        labels: &[],
    },
    Descriptor {
        name: "ssl_ocsp_response_status",
        help: "The status in the OCSP response 0=Good 1=Revoked 2=Unknown",
        labels: &[],
    },
    Descriptor {
        name: "ssl_ocsp_response_produced_at",
        help: "The producedAt value in the OCSP response, expressed as a Unix Epoch Time",
        labels: &[],
    },
    Descriptor {
        name: "ssl_ocsp_response_this_update",
        help: "The thisUpdate value in the OCSP response, expressed as a Unix Epoch Time",
        labels: &[],
    },
    Descriptor {
        name: "ssl_ocsp_response_next_update",
        help: "The nextUpdate value in the OCSP response, expressed as a Unix Epoch Time",
        labels: &[],
    },
    Descriptor {
        name: "ssl_ocsp_response_revoked_at",
        help: "The revocationTime value in the OCSP response, expressed as a Unix Epoch Time",
        labels: &[],
    },
    Descriptor {
        name: "ssl_file_cert_not_after",
        help: "NotAfter expressed as a Unix Epoch Time for a certificate found in a file",
        labels: FILE_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_file_cert_not_before",
        help: "NotBefore expressed as a Unix Epoch Time for a certificate found in a file",
        labels: FILE_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_kubernetes_cert_not_after",
        help: "NotAfter expressed as a Unix Epoch Time for a certificate found in a kubernetes secret",
        labels: KUBERNETES_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_kubernetes_cert_not_before",
        help: "NotBefore expressed as a Unix Epoch Time for a certificate found in a kubernetes secret",
        labels: KUBERNETES_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_kubeconfig_cert_not_after",
        help: "NotAfter expressed as a Unix Epoch Time for a certificate found in a kubeconfig",
        labels: KUBECONFIG_CERT_LABELS,
    },
    Descriptor {
        name: "ssl_kubeconfig_cert_not_before",
        help: "NotBefore expressed as a Unix Epoch Time for a certificate found in a kubeconfig",
        labels: KUBECONFIG_CERT_LABELS,
    },
];

/// Look up the descriptor for a metric family name.
pub fn lookup(name: &str) -> Option<&'static Descriptor> {
    static INDEX: OnceLock<HashMap<&'static str, &'static Descriptor>> = OnceLock::new();

    INDEX
        .get_or_init(|| DESCRIPTORS.iter().map(|d| (d.name, d)).collect())
        .get(name)
        .copied()
}

/// Sort rank of a label within a family: its position in the descriptor's
/// canonical label list. Labels the descriptor does not know about sort
/// last, which tolerates forward-compatible additions from probers.
pub fn label_rank(desc: &Descriptor, label: &str) -> usize {
    desc.labels
        .iter()
        .position(|l| *l == label)
        .unwrap_or(usize::MAX)
}
