//! Stubby: an HTTP stub server with a REST admin API.
//!
//! Endpoints (request pattern to response list) live in an in-memory
//! [`EndpointStore`]. The stub listener answers traffic from that store; the
//! admin listener creates, replaces, lists and removes endpoints at runtime.

pub mod admin;
pub mod config;
pub mod contract;
pub mod http;
pub mod loader;
pub mod matcher;
pub mod selector;
pub mod server;
pub mod store;
pub mod stub;
pub mod tls;

pub use config::{Config, StartOptions};
pub use contract::{
    validate, ContractViolation, EndpointContract, EndpointRecord, RequestSpec, ResponseSpec,
    CONTRACT_VIOLATION,
};
pub use server::{StartError, Stubby};
pub use store::{EndpointStore, StoreError};
