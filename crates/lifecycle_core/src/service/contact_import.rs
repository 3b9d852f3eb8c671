//! Contact import for incoming account migrations.
//!
//! # Responsibility
//! - Rebuild the receiving half of one archived relationship on the
//!   destination account, plus its aspect memberships.
//!
//! # Invariants
//! - Records with `receiving = false` never create an edge; the sharing half
//!   is rebuilt from the other side's archive by the migration dispatcher.
//! - A missing aspect, or a store failure while joining one, skips only that
//!   membership; the edge stays.
//! - An edge rejected by validation is reported and skipped, never raised.

use crate::model::account::Account;
use crate::model::contact::{ContactId, ContactValidationError, NewContact};
use crate::model::person::normalize_handle;
use crate::repo::contact_repo::ContactRepository;
use crate::repo::person_repo::PersonRepository;
use crate::repo::RepoError;
use crate::report::Reporter;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const COMPONENT: &str = "contact_import";

/// One archived relationship record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedContact {
    /// `user@host` handle of the contact's person.
    pub account_id: String,
    /// The exporting account received from this contact.
    pub receiving: bool,
    #[serde(default)]
    pub sharing: bool,
    /// Aspect names the contact was a member of.
    #[serde(default)]
    pub contact_groups_membership: Vec<String>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_guid: Option<String>,
}

impl ArchivedContact {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Result of importing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// `receiving` was false.
    Skipped,
    Imported {
        contact_id: ContactId,
        aspects_joined: usize,
        aspects_missing: Vec<String>,
        /// Aspects whose lookup or membership write failed.
        aspects_failed: Vec<String>,
    },
    /// Edge creation failed validation; nothing was written.
    Rejected(ContactValidationError),
}

/// Counters for a batch of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum ContactImportError {
    /// The handle is malformed or unknown here.
    PersonNotFound(String),
    Repo(RepoError),
}

impl Display for ContactImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonNotFound(handle) => write!(f, "person not found: {handle}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContactImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PersonNotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ContactImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Imports archived contacts into one destination account.
pub struct ContactImporter<P, C, R>
where
    P: PersonRepository,
    C: ContactRepository,
    R: Reporter,
{
    people: P,
    contacts: C,
    reporter: R,
    account: Account,
}

impl<P, C, R> ContactImporter<P, C, R>
where
    P: PersonRepository,
    C: ContactRepository,
    R: Reporter,
{
    pub fn new(people: P, contacts: C, reporter: R, account: Account) -> Self {
        Self {
            people,
            contacts,
            reporter,
            account,
        }
    }

    /// Imports one record.
    ///
    /// # Errors
    /// - `PersonNotFound` when the handle does not resolve; no edge is attempted.
    /// - `Repo` on storage failures while resolving the person or creating the
    ///   edge. Failures after the edge exists are reported on the outcome.
    pub fn import(&self, record: &ArchivedContact) -> Result<ImportOutcome, ContactImportError> {
        if !record.receiving {
            return Ok(ImportOutcome::Skipped);
        }

        let handle = normalize_handle(&record.account_id)
            .ok_or_else(|| ContactImportError::PersonNotFound(record.account_id.clone()))?;
        let person = self
            .people
            .find_by_handle(&handle)?
            .ok_or_else(|| ContactImportError::PersonNotFound(handle.clone()))?;

        let new_contact = NewContact::receiving_only(self.account.id, person.id);
        let contact = match self.contacts.create_contact(&new_contact) {
            Ok(contact) => contact,
            Err(RepoError::Validation(err)) => {
                self.reporter
                    .warn(COMPONENT, &format!("{}: {err}", self.label(&handle)));
                return Ok(ImportOutcome::Rejected(err));
            }
            Err(other) => return Err(other.into()),
        };

        let mut aspects_joined = 0;
        let mut aspects_missing = Vec::new();
        let mut aspects_failed = Vec::new();
        for group_name in &record.contact_groups_membership {
            match self.join_aspect(contact.id, group_name) {
                Ok(true) => aspects_joined += 1,
                Ok(false) => {
                    self.reporter.warn(
                        COMPONENT,
                        &format!("{}: aspect \"{group_name}\" is missing", self.label(&handle)),
                    );
                    aspects_missing.push(group_name.clone());
                }
                Err(err) => {
                    self.reporter.warn(
                        COMPONENT,
                        &format!(
                            "{}: aspect \"{group_name}\" not joined: {err}",
                            self.label(&handle)
                        ),
                    );
                    aspects_failed.push(group_name.clone());
                }
            }
        }

        Ok(ImportOutcome::Imported {
            contact_id: contact.id,
            aspects_joined,
            aspects_missing,
            aspects_failed,
        })
    }

    /// Imports many records; one failing record never stops the batch.
    pub fn import_all<'a>(&self, records: impl IntoIterator<Item = &'a ArchivedContact>) -> ImportStats {
        let mut stats = ImportStats::default();
        for record in records {
            match self.import(record) {
                Ok(ImportOutcome::Imported { .. }) => stats.imported += 1,
                Ok(ImportOutcome::Skipped) => stats.skipped += 1,
                Ok(ImportOutcome::Rejected(_)) => stats.rejected += 1,
                Err(err) => {
                    self.reporter.warn(
                        COMPONENT,
                        &format!("{}: {err}", self.label(&record.account_id)),
                    );
                    stats.failed += 1;
                }
            }
        }
        self.reporter.info(
            COMPONENT,
            &format!(
                "account {}: imported={} skipped={} rejected={} failed={}",
                self.account.username, stats.imported, stats.skipped, stats.rejected, stats.failed
            ),
        );
        stats
    }

    /// `Ok(false)` when the account has no aspect with that name.
    fn join_aspect(&self, contact_id: ContactId, name: &str) -> Result<bool, RepoError> {
        let Some(aspect) = self.contacts.find_aspect_by_name(self.account.id, name)? else {
            return Ok(false);
        };
        self.contacts.add_to_aspect(contact_id, aspect.id)?;
        Ok(true)
    }

    fn label(&self, handle: &str) -> String {
        format!(
            "ContactImporter(account={}, contact={handle})",
            self.account.username
        )
    }
}
