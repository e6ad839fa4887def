//! Loading the initial endpoint data set from disk.
//!
//! A data file is a YAML or JSON list of endpoint contracts:
//!
//! ```yaml
//! - request:
//!     url: /hello
//!     method: [GET, HEAD]
//!   response:
//!     - status: 200
//!       body: hi
//!     - status: 503
//!       latency: 250
//! ```

use crate::contract::EndpointContract;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read data file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse JSON data file '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse YAML data file '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Parsed data file plus the directory its relative `file` handles resolve against.
#[derive(Debug)]
pub struct DataSet {
    pub endpoints: Vec<EndpointContract>,
    pub base_dir: PathBuf,
}

/// Read endpoints from `path`. `.json` files are parsed as JSON, anything
/// else as YAML.
pub fn load_data_file(path: &Path) -> Result<DataSet, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let endpoints = if is_json {
        serde_json::from_str(&contents).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        parse_yaml(&contents).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(DataSet {
        endpoints,
        base_dir,
    })
}

/// An empty document is an empty data set.
fn parse_yaml(contents: &str) -> Result<Vec<EndpointContract>, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(contents)
}
