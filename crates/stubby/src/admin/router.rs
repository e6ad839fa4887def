//! Route dispatch for the admin API.

use crate::admin::handlers;
use crate::http::{collect_body, error_response, method_not_allowed, not_found};
use crate::store::EndpointStore;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Shared state for admin request handling.
pub struct AdminContext {
    pub store: Arc<EndpointStore>,
    /// Normalized route prefix: empty, or `/segment` without a trailing slash.
    pub prefix: String,
}

impl AdminContext {
    pub fn new(store: Arc<EndpointStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }
}

/// Parsed admin route
#[derive(Debug, PartialEq, Eq)]
enum EndpointRoute<'a> {
    /// GET /ping
    Ping,
    /// GET/POST/DELETE /endpoints
    Collection,
    /// GET/PUT/DELETE /endpoints/:id
    Item(&'a str),
}

impl<'a> EndpointRoute<'a> {
    /// Parse a prefix-free path. A single trailing slash is tolerated.
    fn parse(path: &'a str) -> Option<Self> {
        let path = path.strip_prefix('/')?;
        let path = path.strip_suffix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["ping"] => Some(EndpointRoute::Ping),
            ["endpoints"] => Some(EndpointRoute::Collection),
            ["endpoints", id] if !id.is_empty() => Some(EndpointRoute::Item(id)),
            _ => None,
        }
    }
}

/// hyper entry point for the admin listener.
pub async fn handle_admin_request(
    req: Request<Incoming>,
    ctx: Arc<AdminContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return Ok(error_response(StatusCode::BAD_REQUEST, &e)),
    };

    Ok(dispatch(&ctx, &method, &path, &body))
}

/// Route a request whose body has already been read.
pub fn dispatch(
    ctx: &AdminContext,
    method: &Method,
    path: &str,
    body: &[u8],
) -> Response<Full<Bytes>> {
    let Some(path) = strip_prefix(path, &ctx.prefix) else {
        return not_found();
    };
    let Some(route) = EndpointRoute::parse(path) else {
        return not_found();
    };

    let store = ctx.store.as_ref();
    match (method, route) {
        (&Method::GET, EndpointRoute::Ping) => handlers::handle_ping(),

        // /endpoints
        (&Method::GET, EndpointRoute::Collection) => handlers::handle_list(store),
        (&Method::POST, EndpointRoute::Collection) => {
            handlers::handle_create(store, body, &ctx.prefix)
        }
        (&Method::DELETE, EndpointRoute::Collection) => handlers::handle_delete_all(store),

        // /endpoints/:id
        (&Method::GET, EndpointRoute::Item(id)) => handlers::handle_get(store, id),
        (&Method::PUT, EndpointRoute::Item(id)) => handlers::handle_replace(store, id, body),
        (&Method::DELETE, EndpointRoute::Item(id)) => handlers::handle_delete(store, id),

        _ => method_not_allowed(),
    }
}

/// The path below `prefix`, or `None` when the path lies outside it.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(prefix)? {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(prefix: &str) -> AdminContext {
        AdminContext::new(Arc::new(EndpointStore::new()), prefix)
    }

    #[test]
    fn test_endpoint_route_parse() {
        assert_eq!(EndpointRoute::parse("/ping"), Some(EndpointRoute::Ping));
        assert_eq!(
            EndpointRoute::parse("/endpoints"),
            Some(EndpointRoute::Collection)
        );
        assert_eq!(
            EndpointRoute::parse("/endpoints/"),
            Some(EndpointRoute::Collection)
        );
        assert_eq!(
            EndpointRoute::parse("/endpoints/7"),
            Some(EndpointRoute::Item("7"))
        );
        assert_eq!(EndpointRoute::parse("/endpoints/7/extra"), None);
        assert_eq!(EndpointRoute::parse("/"), None);
        assert_eq!(EndpointRoute::parse("/unknown"), None);
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/endpoints", ""), Some("/endpoints"));
        assert_eq!(strip_prefix("/api/endpoints", "/api"), Some("/endpoints"));
        assert_eq!(strip_prefix("/api", "/api"), Some("/"));
        assert_eq!(strip_prefix("/apix/endpoints", "/api"), None);
        assert_eq!(strip_prefix("/endpoints", "/api"), None);
    }

    #[test]
    fn test_dispatch_status_codes() {
        let ctx = ctx("");
        let contract = br#"{"request":{"url":"/a"},"response":{"status":200}}"#;

        assert_eq!(
            dispatch(&ctx, &Method::GET, "/ping", b"").status(),
            StatusCode::OK
        );
        assert_eq!(
            dispatch(&ctx, &Method::POST, "/endpoints", contract).status(),
            StatusCode::CREATED
        );
        assert_eq!(
            dispatch(&ctx, &Method::GET, "/endpoints/1", b"").status(),
            StatusCode::OK
        );
        assert_eq!(
            dispatch(&ctx, &Method::PUT, "/endpoints/1", contract).status(),
            StatusCode::OK
        );
        assert_eq!(
            dispatch(&ctx, &Method::PUT, "/endpoints/2", contract).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatch(&ctx, &Method::DELETE, "/endpoints/1", b"").status(),
            StatusCode::OK
        );
        assert_eq!(
            dispatch(&ctx, &Method::GET, "/endpoints/1", b"").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatch(&ctx, &Method::DELETE, "/endpoints", b"").status(),
            StatusCode::OK
        );
    }

    #[test]
    fn test_unknown_path_and_verb() {
        let ctx = ctx("");
        assert_eq!(
            dispatch(&ctx, &Method::GET, "/nope", b"").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatch(&ctx, &Method::PATCH, "/endpoints", b"").status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            dispatch(&ctx, &Method::POST, "/endpoints/1", b"").status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_prefixed_routes() {
        let ctx = ctx("/api");
        assert_eq!(
            dispatch(&ctx, &Method::GET, "/api/endpoints", b"").status(),
            StatusCode::OK
        );
        assert_eq!(
            dispatch(&ctx, &Method::GET, "/endpoints", b"").status(),
            StatusCode::NOT_FOUND
        );
    }
}
