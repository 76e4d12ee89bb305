//! Region to master synchronization
//!
//! Registration runs once at startup. After that a ticker pushes the full
//! public collections every `sync_interval`, the first push one period after
//! start. Each push is a single attempt: failures are logged and the next
//! tick tries again with fresh data.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::RegionConfig;
use crate::directory::{RegisterCityRequest, SyncRequest};
use crate::error::MessageResponse;

use super::client::{ClientError, UpstreamClient};
use super::store::RegionalStore;

pub type SharedStore = Arc<RwLock<RegionalStore>>;

// ============================================================================
// Sync Runner
// ============================================================================

#[derive(Clone)]
pub struct SyncRunner {
    city: String,
    advertised_url: String,
    latitude: f64,
    longitude: f64,
    period: Duration,
    store: SharedStore,
    client: UpstreamClient,
    shutdown: watch::Sender<bool>,
}

impl SyncRunner {
    pub fn new(config: &RegionConfig, store: SharedStore, client: UpstreamClient) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            city: config.city.clone(),
            advertised_url: config.advertised_url(),
            latitude: config.latitude,
            longitude: config.longitude,
            period: config.sync_interval(),
            store,
            client,
            shutdown,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Register the city with the master.
    ///
    /// Returns whether the master acknowledged; a failure never stops the
    /// region from serving.
    pub async fn register(&self) -> bool {
        let animal_count = self.store.read().await.animals().len() as u64;
        let request = RegisterCityRequest {
            city: self.city.clone(),
            url: self.advertised_url.clone(),
            animal_count,
            latitude: self.latitude,
            longitude: self.longitude,
        };

        tracing::info!(
            "Registering {} ({}) with master at {}",
            self.city,
            self.advertised_url,
            self.client.master_url()
        );

        match self.client.register_city(&request).await {
            Ok(response) => {
                tracing::info!("Registration successful: {}", response.message);
                true
            }
            Err(e) => {
                tracing::warn!("Registration failed: {}", e);
                false
            }
        }
    }

    /// Push the current collections once
    pub async fn push_once(&self) -> Result<MessageResponse, ClientError> {
        let request = {
            let store = self.store.read().await;
            SyncRequest {
                city: self.city.clone(),
                data: store.sync_data(),
            }
        };
        let animals = request.data.animals.len();
        let matches = request.data.matches.len();

        let result = self.client.push_sync(&request).await;
        crate::metrics::record_sync_push(&self.city, result.is_ok());

        if result.is_ok() {
            tracing::debug!(city = %self.city, animals, matches, "Sync pushed");
        }
        result
    }

    /// Spawn the periodic push task
    pub fn start(&self) -> SyncHandle {
        let runner = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + runner.period, runner.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            result = runner.push_once() => {
                                if let Err(e) = result {
                                    tracing::warn!("Sync with master failed: {}", e);
                                }
                            }
                            _ = shutdown_rx.changed() => {
                                tracing::info!("Sync task shutting down during push");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Sync task shutting down");
                        break;
                    }
                }
            }
        });

        SyncHandle {
            handle,
            shutdown: self.shutdown.clone(),
        }
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

// ============================================================================
// Sync Handle
// ============================================================================

/// Handle to the running sync task
pub struct SyncHandle {
    handle: tokio::task::JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SyncHandle {
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Trigger shutdown and wait
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}
