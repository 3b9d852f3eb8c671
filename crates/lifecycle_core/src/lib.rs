//! Account lifecycle engine for a federated social node.
//! Deletion cascade, data export job, and contact import share one store.

pub mod config;
pub mod db;
pub mod deletion;
pub mod logging;
pub mod model;
pub mod repo;
pub mod report;
pub mod service;

pub use config::{ConfigError, LifecycleConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use deletion::classification::{verify_registry, Classification, RegistryError};
pub use deletion::{
    AccountDeleter, DeletionError, DeletionResult, DeletionStep, DeletionSummary, DeletionTarget,
};
pub use logging::{
    active_logging, default_log_level, init_logging, init_logging_from_config, LoggingError,
};
pub use repo::deletion_repo::{DeletionStore, SqliteDeletionStore};
pub use repo::{RepoError, RepoResult};
pub use report::{LogReporter, MemoryReporter, ReportEntry, Reporter};
pub use service::contact_import::{ArchivedContact, ContactImporter, ImportOutcome, ImportStats};
pub use service::export_job::{ExportJob, ExportOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
