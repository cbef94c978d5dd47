//! TCP TLS handshake prober.
//!
//! Connects to `host:port`, completes a TLS handshake with the module's
//! TLS parameters, and reports the negotiated protocol version as
//! `ssl_tls_version_info{version}` = 1. Certificate contents are left to
//! the richer probers; this one only establishes and inspects the session.

use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use prometheus::{GaugeVec, Opts, Registry};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};

use crate::config::{Module, TlsConfig};

use super::{ProbeError, Prober};

/// Probes a raw TCP endpoint with a TLS handshake.
#[derive(Debug, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe(&self, target: &str, module: &Module, registry: &Registry) -> Result<(), ProbeError> {
        let version_info = GaugeVec::new(
            Opts::new("ssl_tls_version_info", "The TLS version used"),
            &["version"],
        )?;
        registry.register(Box::new(version_info.clone()))?;

        let addr = target
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ProbeError::Target(target.to_string(), "no address resolved".into()))?;

        let mut stream = TcpStream::connect_timeout(&addr, module.timeout)?;
        stream.set_read_timeout(Some(module.timeout))?;
        stream.set_write_timeout(Some(module.timeout))?;

        let sni = module
            .tls_config
            .server_name
            .clone()
            .unwrap_or_else(|| host_for_sni(target).to_string());
        let server_name = ServerName::try_from(sni)
            .map_err(|e| ProbeError::Target(target.to_string(), e.to_string()))?;

        let config = client_config(&module.tls_config)?;
        let mut conn = ClientConnection::new(Arc::new(config), server_name)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut stream)?;
        }

        let version = conn
            .protocol_version()
            .map(tls_version_label)
            .unwrap_or("unknown");
        version_info.with_label_values(&[version]).set(1.0);

        Ok(())
    }
}

/// Build a rustls client config from module TLS parameters.
fn client_config(tls: &TlsConfig) -> Result<ClientConfig, ProbeError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = if tls.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(root_store(tls)?)
            .with_no_client_auth()
    };

    Ok(config)
}

fn root_store(tls: &TlsConfig) -> Result<rustls::RootCertStore, ProbeError> {
    let mut roots = rustls::RootCertStore::empty();
    match &tls.ca_file {
        Some(path) => {
            let mut reader = BufReader::new(std::fs::File::open(path)?);
            for cert in rustls_pemfile::certs(&mut reader) {
                roots.add(cert?)?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    Ok(roots)
}

/// Host part of a `host:port` target, brackets stripped for IPv6 literals.
fn host_for_sni(target: &str) -> &str {
    let host = target.rsplit_once(':').map(|(h, _)| h).unwrap_or(target);
    host.trim_start_matches('[').trim_end_matches(']')
}

fn tls_version_label(version: rustls::ProtocolVersion) -> &'static str {
    match version {
        rustls::ProtocolVersion::TLSv1_2 => "TLS 1.2",
        rustls::ProtocolVersion::TLSv1_3 => "TLS 1.3",
        _ => "unknown",
    }
}

/// Verifier used for `insecure_skip_verify`: accepts any chain while still
/// checking handshake signatures with the provider's algorithms.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
