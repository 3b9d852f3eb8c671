//! Account/identity deletion cascade.
//!
//! # Responsibility
//! - Remove or anonymize everything attached to a person, and to its local
//!   account when there is one, according to the association classification.
//!
//! # Invariants
//! - Steps run in a fixed order; the first failing step aborts the run.
//! - Account-level steps never run for a remote identity.
//! - Re-running after a partial failure converges on the same terminal state.

pub mod classification;
mod deleter;

pub use deleter::{AccountDeleter, DeletionSummary, DeletionTarget};

use crate::model::person::PersonId;
use crate::repo::RepoError;
use classification::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DeletionResult<T> = Result<T, DeletionError>;

/// Named step of the cascade, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionStep {
    /// Edges of other accounts pointing at the person.
    DeleteContactsOfMe,
    DeleteStandardPersonAssociations,
    TombstonePersonAndProfile,
    DeleteStandardAccountAssociations,
    DeleteInvitationCode,
    RemoveShareVisibilities,
    /// Edges owned by the closing account.
    DisconnectContacts,
    TombstoneAccount,
}

impl DeletionStep {
    /// Steps that run for every target.
    pub const PERSON_STEPS: [DeletionStep; 3] = [
        Self::DeleteContactsOfMe,
        Self::DeleteStandardPersonAssociations,
        Self::TombstonePersonAndProfile,
    ];

    /// Steps that only run when a local account is attached.
    pub const ACCOUNT_STEPS: [DeletionStep; 5] = [
        Self::DeleteStandardAccountAssociations,
        Self::DeleteInvitationCode,
        Self::RemoveShareVisibilities,
        Self::DisconnectContacts,
        Self::TombstoneAccount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeleteContactsOfMe => "delete_contacts_of_me",
            Self::DeleteStandardPersonAssociations => "delete_standard_person_associations",
            Self::TombstonePersonAndProfile => "tombstone_person_and_profile",
            Self::DeleteStandardAccountAssociations => "delete_standard_account_associations",
            Self::DeleteInvitationCode => "delete_invitation_code",
            Self::RemoveShareVisibilities => "remove_share_visibilities",
            Self::DisconnectContacts => "disconnect_contacts",
            Self::TombstoneAccount => "tombstone_account",
        }
    }

    pub fn is_account_step(self) -> bool {
        Self::ACCOUNT_STEPS.contains(&self)
    }
}

#[derive(Debug)]
pub enum DeletionError {
    PersonNotFound(PersonId),
    /// Resolving the target failed before any step ran.
    Lookup(RepoError),
    Registry(RegistryError),
    /// A store operation failed inside `step`.
    Store {
        step: DeletionStep,
        source: RepoError,
    },
    /// One or more normal associations failed to delete; the others were
    /// still processed.
    Associations {
        step: DeletionStep,
        failures: Vec<(&'static str, RepoError)>,
    },
}

impl DeletionError {
    /// Step that failed, when the failure happened inside the cascade.
    pub fn step(&self) -> Option<DeletionStep> {
        match self {
            Self::Store { step, .. } | Self::Associations { step, .. } => Some(*step),
            Self::PersonNotFound(_) | Self::Lookup(_) | Self::Registry(_) => None,
        }
    }
}

impl Display for DeletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::Lookup(err) => write!(f, "deletion target lookup failed: {err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Store { step, source } => write!(f, "{} failed: {source}", step.as_str()),
            Self::Associations { step, failures } => {
                write!(f, "{} failed for", step.as_str())?;
                for (name, err) in failures {
                    write!(f, " [{name}: {err}]")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for DeletionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Lookup(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::Associations { failures, .. } => failures
                .first()
                .map(|(_, err)| err as &(dyn Error + 'static)),
            Self::PersonNotFound(_) => None,
        }
    }
}

impl From<RegistryError> for DeletionError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}
