//! Database layer for rota-sync

mod connection;
mod metadata_repository;
mod migrations;
mod record_repository;

pub use connection::Database;
pub use metadata_repository::LibSqlSyncMetadataRepository;
pub use record_repository::{LibSqlLocalStore, LocalRecord, LocalStore};
