//! Multiplayer layer for the block world: a shared key/value store, the
//! service that mirrors a world into it, and per-client sessions.

pub mod config;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod session;
pub mod store;
pub mod world_sync;

pub use error::SyncError;
