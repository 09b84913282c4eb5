//! TLS configuration for the admission server (spec.md 6: "JSON
//! request/response over HTTPS with mutual TLS"). Certificate and key
//! loading mirror the teacher's hand-rolled PEM-based loader; the
//! connection itself is driven by `tokio_rustls` rather than a manual
//! handshake loop, since the rest of this workspace is tokio-based.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::error::{AdmissionError, Result};
use crate::pem;

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub client_ca_path: Option<PathBuf>,
}

impl TlsConfig {
    pub fn new(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Self {
        Self {
            cert_path: cert_path.as_ref().to_path_buf(),
            key_path: key_path.as_ref().to_path_buf(),
            client_ca_path: None,
        }
    }

    /// Enables mutual TLS: the server requires and verifies a client
    /// certificate chaining to `ca_path`.
    #[must_use]
    pub fn with_client_auth(mut self, ca_path: impl AsRef<Path>) -> Self {
        self.client_ca_path = Some(ca_path.as_ref().to_path_buf());
        self
    }

    pub fn build_acceptor(&self) -> Result<TlsAcceptor> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_private_key(&self.key_path)?;

        let builder = ServerConfig::builder();
        let config = match &self.client_ca_path {
            Some(ca_path) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(ca_path)? {
                    roots
                        .add(cert)
                        .map_err(|e| AdmissionError::Tls(format!("loading client CA: {e}")))?;
                }
                let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                    .build()
                    .map_err(|e| AdmissionError::Tls(format!("building client verifier: {e}")))?;
                builder
                    .with_client_cert_verifier(verifier)
                    .with_single_cert(certs, key)
                    .map_err(|e| AdmissionError::Tls(e.to_string()))?
            }
            None => builder
                .with_no_client_auth()
                .with_single_cert(certs, key)
                .map_err(|e| AdmissionError::Tls(e.to_string()))?,
        };

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = std::fs::read(path)?;
    let certs = pem::certificates(&data)
        .map_err(|e| AdmissionError::Tls(format!("parsing {}: {e}", path.display())))?
        .into_iter()
        .map(CertificateDer::from)
        .collect::<Vec<_>>();
    if certs.is_empty() {
        return Err(AdmissionError::Tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let data = std::fs::read(path)?;
    let blocks = pem::parse_pem(&data).map_err(|e| AdmissionError::Tls(format!("parsing {}: {e}", path.display())))?;
    for block in blocks {
        let key = match block.label.as_str() {
            "PRIVATE KEY" => PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(block.contents)),
            "RSA PRIVATE KEY" => PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(block.contents)),
            "EC PRIVATE KEY" => PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(block.contents)),
            _ => continue,
        };
        return Ok(key);
    }
    Err(AdmissionError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_config_defaults_to_no_client_auth() {
        let config = TlsConfig::new("/cert.pem", "/key.pem");
        assert!(config.client_ca_path.is_none());
    }

    #[test]
    fn with_client_auth_sets_ca_path() {
        let config = TlsConfig::new("/cert.pem", "/key.pem").with_client_auth("/ca.pem");
        assert_eq!(config.client_ca_path.as_deref(), Some(Path::new("/ca.pem")));
    }

    #[test]
    fn missing_cert_file_is_reported() {
        let config = TlsConfig::new("/nonexistent/cert.pem", "/nonexistent/key.pem");
        assert!(config.build_acceptor().is_err());
    }
}
