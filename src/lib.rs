//! pawmatch - multi-city pet adoption directory
//!
//! One master directory server and one regional server per city. Regions
//! own their city's users, animals, likes and matches; the master keeps a
//! registry of cities, an aggregated read-only copy of their public data,
//! and routes clients to the nearest region.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Master and region configuration (builder, env, TOML)
//! - [`directory`] - Master registry, aggregated snapshot, nearest routing
//! - [`region`] - Regional store, like/match engine, sync with the master
//! - [`models`] - Core data structures and wire formats
//! - [`storage`] - Per-collection JSON persistence
//! - [`metrics`] - Prometheus counters
//! - [`utils`] - Id generation and input validation
//!
//! # Example
//!
//! ```no_run
//! use pawmatch::config::RegionConfig;
//! use pawmatch::region::RegionServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RegionConfig::builder()
//!         .city("Toulouse")
//!         .coordinates(43.6047, 1.4442)
//!         .build()?;
//!     let server = RegionServer::new(config)?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod metrics;
pub mod models;
pub mod region;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{MasterConfig, RegionConfig};
    pub use crate::directory::{Directory, DirectoryServer};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Animal, City, LikeEdges, Match, RecordId, SyncData, User};
    pub use crate::region::{RegionServer, RegionalStore, SyncRunner, UpstreamClient};
    pub use crate::storage::{Backend, FileBackend, MemoryBackend};
}

pub use models::{Animal, City, Match, User};
