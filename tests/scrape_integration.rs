//! Scrape Integration Tests for sslwatch
//!
//! End-to-end coverage: the exporter served over HTTP, scrape
//! serialization under concurrent requests, and a live TLS handshake
//! against a self-signed test server.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use sslwatch::config::{AppConfig, Module, Target, TlsConfig};
use sslwatch::exporter::Exporter;
use sslwatch::prober::{ProbeError, Prober, ProberKind, ProberTable};
use sslwatch::server::{create_router, AppState};

// =============================================================================
// Test Helpers
// =============================================================================

/// 2025-01-01T00:00:00Z.
const NOT_AFTER_EPOCH: f64 = 1_735_689_600.0;

/// Deterministic prober emitting one certificate expiry metric.
struct CertStubProber;

impl Prober for CertStubProber {
    fn probe(
        &self,
        _target: &str,
        _module: &Module,
        registry: &Registry,
    ) -> Result<(), ProbeError> {
        let vec = GaugeVec::new(
            Opts::new(
                "ssl_cert_not_after",
                "NotAfter expressed as a Unix Epoch Time",
            ),
            // Scrambled relative to the canonical order on purpose.
            &["cn", "ou", "issuer_cn", "serial_no", "emails", "ips", "dnsnames"],
        )?;
        registry.register(Box::new(vec.clone()))?;
        vec.with_label_values(&["example.com", "", "Test CA", "42", "", "", ""])
            .set(NOT_AFTER_EPOCH);
        Ok(())
    }
}

/// Prober that sleeps, for observing scrape serialization.
struct SlowProber(Duration);

impl Prober for SlowProber {
    fn probe(
        &self,
        _target: &str,
        _module: &Module,
        _registry: &Registry,
    ) -> Result<(), ProbeError> {
        std::thread::sleep(self.0);
        Ok(())
    }
}

fn stub_config(targets: Vec<Target>) -> AppConfig {
    let mut config = AppConfig {
        targets,
        ..Default::default()
    };
    config
        .modules
        .insert("tls_unverified".to_string(), Module::new(ProberKind::Tcp));
    config
}

fn stub_registry(prober: Box<dyn Prober>, targets: Vec<Target>) -> Registry {
    let config = stub_config(targets);
    let mut probers = ProberTable::new();
    probers.register(ProberKind::Tcp, Box::new(ForwardProber(prober)));
    let exporter = Exporter::new(&config, probers).unwrap();

    let registry = Registry::new();
    registry.register(Box::new(exporter)).unwrap();
    registry
}

/// Wrapper so helpers can take `Box<dyn Prober>`.
struct ForwardProber(Box<dyn Prober>);

impl Prober for ForwardProber {
    fn probe(&self, target: &str, module: &Module, registry: &Registry) -> Result<(), ProbeError> {
        self.0.probe(target, module, registry)
    }
}

fn encode_text(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap();
    String::from_utf8(buffer).unwrap()
}

// =============================================================================
// Exposition Tests
// =============================================================================

#[test]
fn test_text_exposition_has_canonical_label_order() {
    let registry = stub_registry(
        Box::new(CertStubProber),
        vec![Target::new("example.com:443").with_module("tls_unverified")],
    );

    let text = encode_text(&registry);

    assert!(text.contains("ssl_probe_success 1"), "{text}");
    assert!(text.contains("ssl_prober{prober=\"tcp\"} 1"), "{text}");
    // Label order in the exposition follows the descriptor, not the
    // prober's declaration order.
    assert!(
        text.contains(
            "ssl_cert_not_after{serial_no=\"42\",issuer_cn=\"Test CA\",cn=\"example.com\""
        ),
        "{text}"
    );
    assert!(text.contains("# HELP ssl_cert_not_after NotAfter expressed as a Unix Epoch Time"));
}

#[test]
fn test_scrapes_are_deterministic() {
    let registry = stub_registry(
        Box::new(CertStubProber),
        vec![Target::new("example.com:443").with_module("tls_unverified")],
    );

    assert_eq!(encode_text(&registry), encode_text(&registry));
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_concurrent_scrapes_serialize() {
    let pause = Duration::from_millis(150);
    let registry = Arc::new(stub_registry(
        Box::new(SlowProber(pause)),
        vec![Target::new("slow.example.com:443").with_module("tls_unverified")],
    ));

    let start = Instant::now();
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let families = registry.gather();
                assert!(!families.is_empty());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Two scrapes of one sleeping target cannot overlap, so the wall time
    // is at least two probe durations.
    assert!(
        start.elapsed() >= pause * 2,
        "scrapes overlapped: {:?}",
        start.elapsed()
    );
}

// =============================================================================
// HTTP Server Tests
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint_serves_exposition() {
    let registry = stub_registry(
        Box::new(CertStubProber),
        vec![Target::new("example.com:443").with_module("tls_unverified")],
    );
    let state = AppState {
        registry,
        targets: 1,
    };

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            // Some sandboxed environments disallow binding; skip the test.
            return;
        }
        Err(e) => panic!("Failed to bind test listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .expect("healthz request failed");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("healthz body not JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["targets"], 1);

    let resp = client
        .get(format!("http://{addr}/metrics"))
        .send()
        .await
        .expect("metrics request failed");
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("ssl_probe_success 1"), "{text}");
    assert!(
        text.contains("ssl_cert_not_after{serial_no=\"42\""),
        "{text}"
    );
}

// =============================================================================
// Live TLS Handshake Tests
// =============================================================================

/// Spawn a one-shot TLS server with a self-signed certificate.
/// Returns `None` when the sandbox forbids binding.
fn spawn_tls_server() -> Option<std::net::SocketAddr> {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    params.not_before = rcgen::date_time_ymd(2024, 1, 1);
    params.not_after = rcgen::date_time_ymd(2025, 1, 1);
    let cert = params.self_signed(&key_pair).unwrap();

    let cert_der = rustls::pki_types::CertificateDer::from(cert.der().to_vec());
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(
        rustls::pki_types::PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
    );

    let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert_der], key_der)
    .unwrap();
    let server_config = Arc::new(server_config);

    let listener = match std::net::TcpListener::bind("127.0.0.1:0") {
        Ok(l) => l,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("Failed to bind test listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut conn = rustls::ServerConnection::new(Arc::clone(&server_config)).unwrap();
            while conn.is_handshaking() {
                if conn.complete_io(&mut stream).is_err() {
                    break;
                }
            }
        }
    });

    Some(addr)
}

fn unverified_module() -> Module {
    Module::new(ProberKind::Tcp)
        .with_timeout(Duration::from_secs(2))
        .with_tls_config(TlsConfig {
            insecure_skip_verify: true,
            ..Default::default()
        })
}

#[test]
fn test_tcp_prober_handshake_reports_tls_version() {
    let Some(addr) = spawn_tls_server() else {
        return;
    };

    let registry = Registry::new();
    sslwatch::prober::TcpProber
        .probe(&addr.to_string(), &unverified_module(), &registry)
        .expect("handshake probe failed");

    let families = registry.gather();
    let version = families
        .iter()
        .find(|f| f.get_name() == "ssl_tls_version_info")
        .expect("version family missing");
    let metric = &version.get_metric()[0];
    assert_eq!(metric.get_label()[0].get_name(), "version");
    assert!(metric.get_label()[0].get_value().starts_with("TLS 1."));
    assert_eq!(metric.get_gauge().get_value(), 1.0);
}

#[test]
fn test_end_to_end_handshake_scrape() {
    let Some(addr) = spawn_tls_server() else {
        return;
    };

    let mut config = AppConfig {
        targets: vec![Target::new(addr.to_string()).with_module("tls_unverified")],
        ..Default::default()
    };
    config
        .modules
        .insert("tls_unverified".to_string(), unverified_module());

    let exporter = Exporter::new(&config, ProberTable::builtin()).unwrap();
    let registry = Registry::new();
    registry.register(Box::new(exporter)).unwrap();

    let text = encode_text(&registry);
    assert!(text.contains("ssl_probe_success 1"), "{text}");
    assert!(text.contains("ssl_tls_version_info{version=\"TLS 1."), "{text}");
}

#[test]
fn test_handshake_against_verifying_module_fails_for_self_signed() {
    let Some(addr) = spawn_tls_server() else {
        return;
    };

    let mut config = AppConfig {
        targets: vec![Target::new(addr.to_string()).with_module("tls_connect")],
        ..Default::default()
    };
    config.modules.insert(
        "tls_connect".to_string(),
        Module::new(ProberKind::Tcp).with_timeout(Duration::from_secs(2)),
    );

    let exporter = Exporter::new(&config, ProberTable::builtin()).unwrap();
    let registry = Registry::new();
    registry.register(Box::new(exporter)).unwrap();

    // Verification fails against the web PKI roots; the failure is
    // reported through the success gauge, not by omitting output.
    let text = encode_text(&registry);
    assert!(text.contains("ssl_probe_success 0"), "{text}");
    assert!(text.contains("ssl_prober{prober=\"tcp\"} 1"), "{text}");
}
