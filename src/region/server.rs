//! Regional server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RegionConfig;
use crate::error::{Error, Result};
use crate::storage::{Backend, FileBackend};

use super::api::create_router;
use super::client::{ClientConfig, UpstreamClient};
use super::store::RegionalStore;
use super::sync::{SharedStore, SyncRunner};

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct RegionState {
    pub store: SharedStore,

    /// Client for the master and peer regions
    pub client: UpstreamClient,

    pub runner: SyncRunner,

    pub config: RegionConfig,

    pub start_time: Instant,
}

// ============================================================================
// Region Server
// ============================================================================

pub struct RegionServer {
    config: RegionConfig,
    state: RegionState,
}

impl RegionServer {
    /// Create a server backed by JSON files under `config.data_dir`
    pub fn new(config: RegionConfig) -> Result<Self> {
        config.validate()?;
        let backend = FileBackend::new(&config.data_dir).map_err(|e| {
            Error::config(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: RegionConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        let client = UpstreamClient::new(
            ClientConfig::new(config.master_base_url()).with_timeout(config.upstream_timeout()),
        )?;
        Ok(Self::with_client(config, backend, client))
    }

    /// Create a server with an explicit upstream client
    pub fn with_client(config: RegionConfig, backend: Arc<dyn Backend>, client: UpstreamClient) -> Self {
        let store: SharedStore = Arc::new(RwLock::new(RegionalStore::load(
            config.city.clone(),
            backend,
        )));
        let runner = SyncRunner::new(&config, store.clone(), client.clone());

        let state = RegionState {
            store,
            client,
            runner,
            config: config.clone(),
            start_time: Instant::now(),
        };
        Self { config, state }
    }

    pub fn state(&self) -> RegionState {
        self.state.clone()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.config.bind_address
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind, register with the master, start syncing and serve until
    /// `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::other(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("Region {} listening on {}", self.config.city, addr);

        self.state.runner.register().await;
        let sync_handle = self.state.runner.start();
        tracing::info!(
            "Sync with master every {:?}",
            self.state.runner.period()
        );

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| Error::other(format!("Server error: {e}")));

        sync_handle.shutdown().await;
        tracing::info!("Region {} shutdown complete", self.config.city);
        served
    }
}
