//! Endpoint CRUD handlers.

use crate::contract::{EndpointContract, CONTRACT_VIOLATION};
use crate::http::{build_response, build_response_with_headers, error_response, json_response};
use crate::store::{EndpointStore, StoreError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CreatedEndpoint<'a> {
    id: &'a str,
}

/// GET /ping
pub fn handle_ping() -> Response<Full<Bytes>> {
    build_response(StatusCode::OK, "pong")
}

/// GET /endpoints
pub fn handle_list(store: &EndpointStore) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &store.get_all())
}

/// GET /endpoints/:id
pub fn handle_get(store: &EndpointStore, id: &str) -> Response<Full<Bytes>> {
    match store.get(id) {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => store_error_response(e),
    }
}

/// POST /endpoints - Create an endpoint
///
/// Answers 201 with `{"id": ...}` and a `Location` pointing at the new record.
pub fn handle_create(store: &EndpointStore, body: &[u8], prefix: &str) -> Response<Full<Bytes>> {
    let Some(contract) = parse_contract(body) else {
        return error_response(StatusCode::BAD_REQUEST, CONTRACT_VIOLATION);
    };

    match store.create(contract) {
        Ok(id) => {
            let location = format!("{prefix}/endpoints/{id}");
            let body = serde_json::to_string(&CreatedEndpoint { id: &id })
                .unwrap_or_else(|_| "{}".to_string());
            build_response_with_headers(
                StatusCode::CREATED,
                [
                    ("Content-Type", "application/json"),
                    ("Location", location.as_str()),
                ],
                body,
            )
        }
        Err(e) => store_error_response(e),
    }
}

/// PUT /endpoints/:id - Replace an endpoint wholesale
pub fn handle_replace(store: &EndpointStore, id: &str, body: &[u8]) -> Response<Full<Bytes>> {
    let Some(contract) = parse_contract(body) else {
        return error_response(StatusCode::BAD_REQUEST, CONTRACT_VIOLATION);
    };

    match store.update(id, contract) {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /endpoints/:id
pub fn handle_delete(store: &EndpointStore, id: &str) -> Response<Full<Bytes>> {
    match store.delete(id) {
        Ok(removed) => json_response(StatusCode::OK, &removed),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /endpoints
pub fn handle_delete_all(store: &EndpointStore) -> Response<Full<Bytes>> {
    store.delete_all();
    json_response(StatusCode::OK, &serde_json::json!([]))
}

/// Bodies that are not an endpoint contract are treated like contracts that
/// fail validation.
fn parse_contract(body: &[u8]) -> Option<EndpointContract> {
    match serde_json::from_slice(body) {
        Ok(contract) => Some(contract),
        Err(e) => {
            debug!("Rejected endpoint body: {}", e);
            None
        }
    }
}

fn store_error_response(err: StoreError) -> Response<Full<Bytes>> {
    let status = match err {
        StoreError::Contract(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    error_response(status, &err.to_string())
}
