//! Lifecycle use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and external collaborators into the
//!   export and migration-import entry points.
//! - Keep job/migration infrastructure decoupled from storage details.

pub mod contact_import;
pub mod export_job;
