//! Relationship edges ("contacts") and the groups ("aspects") they belong to.
//!
//! # Invariants
//! - At most one edge per `(account_id, person_id)` pair.
//! - An account never holds an edge to its own person.
//! - Aspects are owned by one account and unique by name within it.

use crate::model::account::AccountId;
use crate::model::person::PersonId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Row id of `contacts`.
pub type ContactId = i64;
/// Row id of `aspects`.
pub type AspectId = i64;

/// Directed edge from an owning account to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub account_id: AccountId,
    pub person_id: PersonId,
    /// The owner publishes to the person.
    pub sharing: bool,
    /// The owner consumes from the person.
    pub receiving: bool,
}

/// Input for a new edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewContact {
    pub account_id: AccountId,
    pub person_id: PersonId,
    pub sharing: bool,
    pub receiving: bool,
}

impl NewContact {
    /// Edge that only receives from the person.
    pub fn receiving_only(account_id: AccountId, person_id: PersonId) -> Self {
        Self {
            account_id,
            person_id,
            sharing: false,
            receiving: true,
        }
    }

    /// Checks edge invariants that do not need storage access.
    ///
    /// `own_person_id` is the person paired with `account_id`, when known.
    pub fn validate(&self, own_person_id: Option<PersonId>) -> Result<(), ContactValidationError> {
        if own_person_id == Some(self.person_id) {
            return Err(ContactValidationError::SelfContact {
                account_id: self.account_id,
            });
        }
        Ok(())
    }
}

/// Validation failures for edge creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    SelfContact {
        account_id: AccountId,
    },
    AlreadyExists {
        account_id: AccountId,
        person_id: PersonId,
    },
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfContact { account_id } => {
                write!(f, "account {account_id} cannot add its own person as contact")
            }
            Self::AlreadyExists {
                account_id,
                person_id,
            } => write!(
                f,
                "contact from account {account_id} to person {person_id} already exists"
            ),
        }
    }
}

impl Error for ContactValidationError {}

/// Named group of contacts owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aspect {
    pub id: AspectId,
    pub account_id: AccountId,
    pub name: String,
    pub contacts_visible: bool,
    pub order_id: Option<i64>,
}
