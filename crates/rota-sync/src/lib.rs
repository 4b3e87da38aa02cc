//! rota-sync - Offline-first synchronization for a pool-table rental route
//!
//! This crate moves route, client, table, settlement and expense records
//! between a device's local libSQL store and a shared remote document store.
//! Pulls are incremental with a full-query fallback, conflicts resolve by
//! last-writer-wins on server timestamps, and every record passes a
//! referential integrity gate and the operator's route scope before it is
//! written or sent. Photos travel through a blob store.

pub mod assets;
pub mod config;
pub mod db;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod tenant;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use sync::{SyncError, SyncHandler, SyncRegistry, SyncReport};
pub use tenant::{Operator, TenantScope};
