//! Domain model for local accounts, federated identities and their graph.
//!
//! # Responsibility
//! - Define the records the lifecycle operations read and scrub.
//! - Declare every relationship type of `Account` and `Person`.
//!
//! # Invariants
//! - Accounts and people are never hard-deleted; closure is a tombstone.
//! - Each account is paired with exactly one person (`people.owner_id`).

pub mod account;
pub mod association;
pub mod contact;
pub mod person;
