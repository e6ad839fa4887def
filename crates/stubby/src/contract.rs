//! Endpoint contracts and the validator that guards every registry mutation.
//!
//! A contract is what a client hands to the store: a request spec describing
//! which traffic it answers and an ordered list of responses. The wire format
//! accepts a few shorthands (a single `method` string, a single `response`
//! object) which are normalized into sequences on deserialization.

use crate::matcher::RequestMatcher;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::debug;

/// The only message a rejected contract ever produces.
pub const CONTRACT_VIOLATION: &str = "The supplied endpoint data couldn't be saved";

const VALID_STATUS: RangeInclusive<i64> = 100..=599;

/// A candidate endpoint failed validation.
///
/// The message is stable and carries no detail about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The supplied endpoint data couldn't be saved")]
pub struct ContractViolation;

// ============================================================================
// Wire types
// ============================================================================

/// Candidate endpoint supplied to `create` / `update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointContract {
    #[serde(default)]
    pub request: RequestSpec,
    /// Accepts a single response object or an array of them.
    #[serde(default, deserialize_with = "one_or_many")]
    pub response: Vec<ResponseSpec>,
}

impl EndpointContract {
    pub fn new(request: RequestSpec, response: Vec<ResponseSpec>) -> Self {
        Self { request, response }
    }
}

/// Request side of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Literal path, or a regular expression when it starts with `^`.
    #[serde(default)]
    pub url: String,
    /// Accepted verbs. Absent means `GET`; an explicit empty list means any verb.
    #[serde(default = "default_methods", deserialize_with = "one_or_many")]
    pub method: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, String>,
    /// Expected body, literal or `^`-prefixed pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: default_methods(),
            headers: HashMap::new(),
            query: HashMap::new(),
            post: None,
        }
    }
}

impl RequestSpec {
    /// `GET` request spec for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = vec![method.into()];
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_post(mut self, post: impl Into<String>) -> Self {
        self.post = Some(post.into());
        self
    }
}

/// One candidate response of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Kept wide so out-of-range codes reach the validator instead of failing
    /// deserialization.
    #[serde(default = "default_status")]
    pub status: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Payload handle resolved by the stub server; falls back to `body`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Delay in milliseconds before the response is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self::new(default_status())
    }
}

impl ResponseSpec {
    pub fn new(status: i64) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
            file: None,
            latency: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(serde_json::Value::String(body.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency = Some(latency_ms);
        self
    }

    /// Body bytes as they go on the wire: strings verbatim, other JSON compact.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(s)) => s.clone().into_bytes(),
            Some(other) => other.to_string().into_bytes(),
        }
    }
}

/// An endpoint as held by the store and shown on the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    pub id: String,
    pub request: RequestSpec,
    pub response: Vec<ResponseSpec>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl EndpointRecord {
    pub fn contract(&self) -> EndpointContract {
        EndpointContract::new(self.request.clone(), self.response.clone())
    }
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

fn default_status() -> i64 {
    200
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

// ============================================================================
// Validation
// ============================================================================

/// Check a candidate before it may enter the registry.
///
/// Checks run in order and stop at the first failure: url present, at least
/// one response, every status in 100..=599, url/post patterns compile, and
/// response headers are valid HTTP header names and values.
pub fn validate(contract: &EndpointContract) -> Result<(), ContractViolation> {
    if contract.request.url.trim().is_empty() {
        debug!("Contract rejected: request url is missing");
        return Err(ContractViolation);
    }

    if contract.response.is_empty() {
        debug!(url = %contract.request.url, "Contract rejected: no responses");
        return Err(ContractViolation);
    }

    if let Some(status) = contract
        .response
        .iter()
        .map(|r| r.status)
        .find(|status| !VALID_STATUS.contains(status))
    {
        debug!(url = %contract.request.url, status, "Contract rejected: invalid status");
        return Err(ContractViolation);
    }

    if let Err(e) = RequestMatcher::compile(&contract.request) {
        debug!(url = %contract.request.url, "Contract rejected: bad pattern: {}", e);
        return Err(ContractViolation);
    }

    if let Some((name, _)) = contract
        .response
        .iter()
        .flat_map(|r| r.headers.iter())
        .find(|(name, value)| !is_valid_header(name, value))
    {
        debug!(
            url = %contract.request.url,
            header = %name,
            "Contract rejected: bad response header"
        );
        return Err(ContractViolation);
    }

    Ok(())
}

fn is_valid_header(name: &str, value: &str) -> bool {
    HeaderName::from_bytes(name.as_bytes()).is_ok() && HeaderValue::from_str(value).is_ok()
}
