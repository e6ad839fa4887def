//! The [`Stubby`] host: one endpoint store served by a stub listener and an
//! admin listener.
//!
//! ```no_run
//! use stubby::{StartOptions, Stubby};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let stubby = Stubby::new();
//! let config = stubby.start(StartOptions::default()).await?;
//! println!("stubs on {}, admin on {}", config.stubs, config.admin);
//! stubby.stop().await;
//! # Ok(())
//! # }
//! ```

mod listener;

#[cfg(test)]
mod tests;

use crate::admin::{handle_admin_request, AdminContext};
use crate::config::{Config, ConfigError, StartOptions};
use crate::contract::{EndpointContract, EndpointRecord};
use crate::store::{EndpointStore, StoreError};
use crate::stub::{handle_stub_request, StubContext};
use crate::tls::create_tls_acceptor;
use listener::spawn_listener;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("Failed to load TLS material: {0}")]
    Tls(anyhow::Error),
    #[error("Initial endpoint data rejected: {0}")]
    Data(#[from] StoreError),
    #[error("Server is already running; stop it before starting again")]
    AlreadyRunning,
}

/// A stub server instance. Instances share nothing, so several can run in
/// one process.
pub struct Stubby {
    store: Arc<EndpointStore>,
    shutdown_tx: broadcast::Sender<()>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    /// Set from the start of `start` until `stop` (or a failed start).
    running: AtomicBool,
}

impl Default for Stubby {
    fn default() -> Self {
        Self::new()
    }
}

impl Stubby {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            store: Arc::new(EndpointStore::new()),
            shutdown_tx,
            listeners: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Shared handle to the endpoint store.
    pub fn endpoints(&self) -> Arc<EndpointStore> {
        Arc::clone(&self.store)
    }

    /// Replace the endpoint `id`. A contract violation surfaces as the
    /// stable violation message.
    pub fn put(&self, id: &str, contract: EndpointContract) -> Result<(), StoreError> {
        self.store.update(id, contract).map(|_| ())
    }

    /// Create an endpoint and return its id.
    pub fn post(&self, contract: EndpointContract) -> Result<String, StoreError> {
        self.store.create(contract)
    }

    /// Remove every endpoint. The store is empty when this returns.
    pub fn delete_all(&self) {
        self.store.delete_all();
    }

    /// Remove one endpoint, returning the record it held.
    pub fn delete_by_id(&self, id: &str) -> Result<EndpointRecord, StoreError> {
        self.store.delete(id)
    }

    /// Resolve `options`, seed the initial data and bring both listeners up.
    ///
    /// Returns once both listeners are accepting. The returned config carries
    /// the ports actually bound, which differ from the requested ones when
    /// port 0 was asked for.
    ///
    /// Fails with [`StartError::AlreadyRunning`] until `stop` has been called.
    /// The store outlives a stop, and every successful start loads its `data`
    /// into it again, so a restart normally passes no data.
    pub async fn start(&self, options: StartOptions) -> Result<Config, StartError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StartError::AlreadyRunning);
        }

        let started = self.start_listeners(options).await;
        if started.is_err() {
            self.running.store(false, Ordering::Release);
        }
        started
    }

    async fn start_listeners(&self, options: StartOptions) -> Result<Config, StartError> {
        let mut config = options.resolve();

        let tls = match config.tls()? {
            Some(tls) => Some(
                create_tls_acceptor(&tls.cert_path, &tls.key_path).map_err(StartError::Tls)?,
            ),
            None => None,
        };

        let stub_listener = bind(&config.location, config.stubs).await?;
        let admin_listener = bind(&config.location, config.admin).await?;
        config.stubs = local_port(&stub_listener, config.stubs);
        config.admin = local_port(&admin_listener, config.admin);

        self.store.seed(config.data.clone())?;

        let stub_ctx = Arc::new(StubContext::new(self.endpoints(), config.data_dir.clone()));
        let admin_ctx = Arc::new(AdminContext::new(
            self.endpoints(),
            config.admin_prefix.clone(),
        ));

        let stub_task = spawn_listener(
            "Stub",
            stub_listener,
            tls.clone(),
            self.shutdown_tx.subscribe(),
            move |req| handle_stub_request(req, Arc::clone(&stub_ctx)),
        );
        let admin_task = spawn_listener(
            "Admin",
            admin_listener,
            tls,
            self.shutdown_tx.subscribe(),
            move |req| handle_admin_request(req, Arc::clone(&admin_ctx)),
        );
        self.listeners.lock().extend([stub_task, admin_task]);

        let scheme = config.scheme();
        info!(
            "Stub server listening on {}://{}:{}",
            scheme, config.location, config.stubs
        );
        info!(
            "Admin server listening on {}://{}:{}{}",
            scheme, config.location, config.admin, config.admin_prefix
        );

        Ok(config)
    }

    /// Stop both listeners and wait for their accept loops to exit.
    ///
    /// Safe to call more than once, or before `start`. Connections already
    /// accepted finish on their own tasks.
    pub async fn stop(&self) {
        // No receivers just means nothing is running.
        let _ = self.shutdown_tx.send(());

        let listeners = std::mem::take(&mut *self.listeners.lock());
        for handle in listeners {
            let _ = handle.await;
        }
        self.running.store(false, Ordering::Release);
    }
}

async fn bind(location: &str, port: u16) -> Result<TcpListener, StartError> {
    TcpListener::bind((location, port))
        .await
        .map_err(|source| StartError::Bind {
            address: format!("{location}:{port}"),
            source,
        })
}

fn local_port(listener: &TcpListener, requested: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(requested)
}
