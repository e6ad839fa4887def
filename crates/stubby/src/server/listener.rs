//! Accept loop shared by the stub and admin listeners.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// Serve `listener` on a background task until `shutdown` fires.
///
/// Each accepted connection runs on its own task. With an acceptor, the TLS
/// handshake happens on that task too, so a slow client never blocks accept.
pub(crate) fn spawn_listener<H, Fut>(
    role: &'static str,
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    mut shutdown: broadcast::Receiver<()>,
    handler: H,
) -> JoinHandle<()>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send + 'static,
{
    tokio::spawn(async move {
        let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let handler = handler.clone();
                            let tls = tls.clone();
                            tokio::spawn(async move {
                                match tls {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => serve_connection(role, tls_stream, handler).await,
                                        Err(e) => warn!("{} TLS handshake failed from {}: {}", role, remote_addr, e),
                                    },
                                    None => serve_connection(role, stream, handler).await,
                                }
                            });
                        }
                        Err(e) => {
                            error!("{} accept error on port {}: {}", role, port, e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("{} server on port {} shutting down", role, port);
                    break;
                }
            }
        }
    })
}

async fn serve_connection<S, H, Fut>(role: &'static str, stream: S, handler: H)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handler(req));
    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!("{} connection error: {}", role, e);
    }
}
