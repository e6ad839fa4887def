//! TLS termination for the stub and admin listeners.
//!
//! Both listeners share one acceptor built from the `key`/`cert` pair given
//! at start.

use anyhow::{bail, Context};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Build the shared acceptor from a PEM certificate chain and a PEM key.
pub fn create_tls_acceptor(cert_path: &Path, key_path: &Path) -> anyhow::Result<TlsAcceptor> {
    let chain = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(chain, key)
    .with_context(|| {
        format!(
            "Key {} cannot serve {}",
            key_path.display(),
            cert_path.display()
        )
    })?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path, what: &str) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} file {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Every certificate in the file, leaf first.
fn load_certificates(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path, "certificate")?;
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed PEM in {}", path.display()))?;
    if chain.is_empty() {
        bail!("No certificates found in {}", path.display());
    }
    Ok(chain)
}

/// The first PKCS#8, PKCS#1 or SEC1 key in the file.
fn load_private_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let mut reader = open(path, "private key")?;
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("Malformed PEM in {}", path.display()))?
        .with_context(|| format!("No private key found in {}", path.display()))
}
