//! Stub (data plane) request handling.
//!
//! Every incoming request is reduced to a [`RequestDescriptor`] and handed
//! to the store. A match yields the response to send plus its simulated
//! latency; no match is a plain 404, not an error.

use crate::contract::ResponseSpec;
use crate::http::{build_response, build_response_with_headers, collect_body, error_response};
use crate::matcher::RequestDescriptor;
use crate::store::EndpointStore;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_MATCH_MESSAGE: &str = "No stubbed endpoint matches the request";

/// Shared state for stub request handling.
pub struct StubContext {
    pub store: Arc<EndpointStore>,
    /// Base directory for relative `file` handles; the working directory when unset.
    pub data_dir: Option<PathBuf>,
}

impl StubContext {
    pub fn new(store: Arc<EndpointStore>, data_dir: Option<PathBuf>) -> Self {
        Self { store, data_dir }
    }
}

/// hyper entry point for the stub listener.
pub async fn handle_stub_request(
    req: Request<Incoming>,
    ctx: Arc<StubContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    let body = match collect_body(req).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Stub request body unreadable: {}", e);
            return Ok(error_response(StatusCode::BAD_REQUEST, &e));
        }
    };

    let body = (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned());
    let descriptor = RequestDescriptor::from_parts(
        method.as_str(),
        uri.path(),
        uri.query(),
        &headers,
        body,
    );

    Ok(respond(&ctx, &descriptor).await)
}

/// Produce the response for an already-parsed request.
pub async fn respond(ctx: &StubContext, request: &RequestDescriptor) -> Response<Full<Bytes>> {
    // The store guard is dropped inside `serve`; nothing below holds it.
    let Some(served) = ctx.store.serve(request) else {
        return error_response(StatusCode::NOT_FOUND, NO_MATCH_MESSAGE);
    };

    let delay = served.selection.delay;
    if !delay.is_zero() {
        debug!(id = %served.endpoint_id, delay_ms = delay.as_millis() as u64, "Applying latency");
        tokio::time::sleep(delay).await;
    }

    let response = served.selection.response;
    let body = resolve_body(&response, ctx.data_dir.as_deref()).await;
    let status = u16::try_from(response.status)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if response.headers.is_empty() {
        build_response(status, body)
    } else {
        build_response_with_headers(status, &response.headers, body)
    }
}

/// Payload bytes for `response`: the `file` contents when readable, else `body`.
async fn resolve_body(response: &ResponseSpec, data_dir: Option<&Path>) -> Bytes {
    if let Some(file) = &response.file {
        let path = match data_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        };
        match tokio::fs::read(&path).await {
            Ok(contents) => return Bytes::from(contents),
            Err(e) => warn!(
                "Response file '{}' unreadable, falling back to body: {}",
                path.display(),
                e
            ),
        }
    }
    Bytes::from(response.body_bytes())
}
