//! Startup configuration.
//!
//! [`StartOptions`] is what a host passes to `Stubby::start`: every field is
//! optional. [`StartOptions::resolve`] fills in the defaults below and yields
//! the [`Config`] the servers actually run with. The CLI uses the same
//! constants for its own defaults.

use crate::contract::EndpointContract;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_STUBS_PORT: u16 = 8882;
pub const DEFAULT_ADMIN_PORT: u16 = 8889;
pub const DEFAULT_LOCATION: &str = "0.0.0.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TLS requires both a key and a certificate; only the {0} was supplied")]
    IncompleteTls(&'static str),
}

/// Unresolved options; `None` means "use the default".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// Stub (data plane) port
    pub stubs: Option<u16>,
    /// Admin (control plane) port
    pub admin: Option<u16>,
    /// Bind host shared by both servers
    pub location: Option<String>,
    /// Endpoints loaded before the servers accept traffic
    pub data: Option<Vec<EndpointContract>>,
    /// Base directory for relative response `file` handles
    pub data_dir: Option<PathBuf>,
    /// PEM private key path
    pub key: Option<PathBuf>,
    /// PEM certificate path
    pub cert: Option<PathBuf>,
    /// Path prefix for admin routes, e.g. `/api`
    pub admin_prefix: Option<String>,
}

impl StartOptions {
    pub fn resolve(self) -> Config {
        Config {
            stubs: self.stubs.unwrap_or(DEFAULT_STUBS_PORT),
            admin: self.admin.unwrap_or(DEFAULT_ADMIN_PORT),
            location: self
                .location
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            data: self.data.unwrap_or_default(),
            data_dir: self.data_dir,
            key: self.key,
            cert: self.cert,
            admin_prefix: normalize_prefix(self.admin_prefix.as_deref().unwrap_or("")),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub stubs: u16,
    pub admin: u16,
    pub location: String,
    pub data: Vec<EndpointContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub admin_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        StartOptions::default().resolve()
    }
}

/// TLS configuration for both listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to TLS private key file (PEM format)
    pub key_path: PathBuf,
}

impl Config {
    /// TLS settings when both key and certificate are configured.
    pub fn tls(&self) -> Result<Option<TlsConfig>, ConfigError> {
        match (&self.key, &self.cert) {
            (Some(key), Some(cert)) => Ok(Some(TlsConfig {
                cert_path: cert.clone(),
                key_path: key.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::IncompleteTls("key")),
            (None, Some(_)) => Err(ConfigError::IncompleteTls("certificate")),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.key.is_some() && self.cert.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// `"api/"` and `"/api"` both become `"/api"`; blank stays blank.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
