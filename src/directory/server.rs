//! Master directory server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::MasterConfig;
use crate::error::{Error, Result};
use crate::storage::{Backend, FileBackend};

use super::api::create_router;
use super::Directory;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct DirectoryState {
    /// Registry and aggregated snapshot
    pub directory: Arc<RwLock<Directory>>,

    /// Server start time
    pub start_time: Instant,
}

impl DirectoryState {
    pub fn new(directory: Directory) -> Self {
        Self {
            directory: Arc::new(RwLock::new(directory)),
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Directory Server
// ============================================================================

pub struct DirectoryServer {
    config: MasterConfig,
    state: DirectoryState,
}

impl DirectoryServer {
    /// Create a server backed by JSON files under `config.data_dir`
    pub fn new(config: MasterConfig) -> Result<Self> {
        config.validate()?;
        let backend = FileBackend::new(&config.data_dir).map_err(|e| {
            Error::config(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: MasterConfig, backend: Arc<dyn Backend>) -> Self {
        let state = DirectoryState::new(Directory::load(backend));
        Self { config, state }
    }

    pub fn state(&self) -> DirectoryState {
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

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::other(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("Master directory listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| Error::other(format!("Server error: {e}")))?;

        tracing::info!("Master directory shutdown complete");
        Ok(())
    }
}
