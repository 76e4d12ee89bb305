//! Regional server
//!
//! One process per city. It owns the city's users, animals, matches and
//! likes, persists each collection after every mutation, and keeps the
//! master directory informed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────┐        ┌────────────────┐
//! │        RegionServer         │        │     Master     │
//! │  ┌───────────┐              │ /sync  │                │
//! │  │ REST API  │  SyncRunner ─┼───────▶│   Directory    │
//! │  └─────┬─────┘      ▲       │        │                │
//! │        ▼            │       │/update │                │
//! │  ┌──────────────────┴──┐    │ City   │                │
//! │  │ RegionalStore       │────┼───────▶│                │
//! │  │ users animals likes │    │        └────────────────┘
//! │  └──────────┬──────────┘    │
//! │             ▼ Backend       │
//! └─────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod likes;
pub mod server;
pub mod store;
pub mod sync;

pub use client::{ClientConfig, ClientError, UpstreamClient};
pub use likes::{LikeBook, LikeOutcome, LikeRecord};
pub use server::{RegionServer, RegionState};
pub use store::{RegionalStore, TransferBundle, UserProfile};
pub use sync::{SharedStore, SyncHandle, SyncRunner};
