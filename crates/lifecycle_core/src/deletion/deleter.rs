//! Deletion orchestrator.
//!
//! # Responsibility
//! - Resolve the target once into a local-account or remote-identity mode.
//! - Run the cascade steps in order, reporting each completed step.
//!
//! # Invariants
//! - `DeleteContactsOfMe` is keyed by the person, never the account.
//! - Paged steps fetch at most `batch_size` ids per query.
//! - No step catches another step's failure.

use super::classification::normal_associations;
use super::{DeletionError, DeletionResult, DeletionStep};
use crate::config::LifecycleConfig;
use crate::model::account::{Account, AccountId};
use crate::model::association::EntityKind;
use crate::model::person::{Person, PersonId};
use crate::repo::deletion_repo::DeletionStore;
use crate::repo::{RepoError, RepoResult};
use crate::report::Reporter;
use log::{error, info};
use std::time::Instant;

/// Entity being torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    /// Person hosted here together with its account.
    LocalAccount { person: Person, account: Account },
    /// Person hosted elsewhere; only local influence is purged.
    RemoteIdentity { person: Person },
}

impl DeletionTarget {
    pub fn person(&self) -> &Person {
        match self {
            Self::LocalAccount { person, .. } | Self::RemoteIdentity { person } => person,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::LocalAccount { account, .. } => Some(account),
            Self::RemoteIdentity { .. } => None,
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::LocalAccount { .. } => "local_account",
            Self::RemoteIdentity { .. } => "remote_identity",
        }
    }
}

/// Outcome of one `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSummary {
    pub person_id: PersonId,
    pub account_id: Option<AccountId>,
    /// Completed steps in order with the rows each affected.
    pub steps: Vec<(DeletionStep, usize)>,
}

impl DeletionSummary {
    pub fn affected(&self, step: DeletionStep) -> Option<usize> {
        self.steps
            .iter()
            .find(|(candidate, _)| *candidate == step)
            .map(|(_, affected)| *affected)
    }

    pub fn total_affected(&self) -> usize {
        self.steps.iter().map(|(_, affected)| affected).sum()
    }
}

/// Runs the deletion cascade for one target.
///
/// Callers must serialize runs against the same target.
pub struct AccountDeleter<S: DeletionStore, R: Reporter> {
    store: S,
    reporter: R,
    target: DeletionTarget,
    batch_size: u32,
    deleted_email_domain: String,
}

impl<S: DeletionStore, R: Reporter> AccountDeleter<S, R> {
    pub fn new(store: S, reporter: R, target: DeletionTarget) -> Self {
        let config = LifecycleConfig::default();
        Self {
            store,
            reporter,
            target,
            batch_size: config.deletion_batch_size,
            deleted_email_domain: config.deleted_email_domain,
        }
    }

    /// Builds a deleter for `person_id`, attaching its account when local.
    pub fn for_person(store: S, reporter: R, person_id: PersonId) -> DeletionResult<Self> {
        let person = store
            .find_person(person_id)
            .map_err(DeletionError::Lookup)?
            .ok_or(DeletionError::PersonNotFound(person_id))?;
        let owner = store
            .find_owner_account(&person)
            .map_err(DeletionError::Lookup)?;
        let target = match owner {
            Some(account) => DeletionTarget::LocalAccount { person, account },
            None => DeletionTarget::RemoteIdentity { person },
        };
        Ok(Self::new(store, reporter, target))
    }

    /// Applies batch size and tombstone domain from `config`.
    pub fn with_config(mut self, config: &LifecycleConfig) -> Self {
        self.batch_size = config.deletion_batch_size.max(1);
        self.deleted_email_domain = config.deleted_email_domain.clone();
        self
    }

    pub fn target(&self) -> &DeletionTarget {
        &self.target
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Runs the whole cascade.
    ///
    /// # Errors
    /// - Returns the first failing step's error; later steps do not run.
    pub fn run(&self) -> DeletionResult<DeletionSummary> {
        let started_at = Instant::now();
        let person_id = self.target.person().id;
        info!(
            "event=account_deletion module=deletion status=start mode={} person_id={}",
            self.target.mode(),
            person_id
        );

        let mut summary = DeletionSummary {
            person_id,
            account_id: self.target.account().map(|account| account.id),
            steps: Vec::with_capacity(8),
        };

        let result = self.run_steps(&mut summary);
        match &result {
            Ok(()) => info!(
                "event=account_deletion module=deletion status=ok mode={} person_id={} affected={} duration_ms={}",
                self.target.mode(),
                person_id,
                summary.total_affected(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=account_deletion module=deletion status=error mode={} person_id={} failed_step={} duration_ms={} error={}",
                self.target.mode(),
                person_id,
                err.step().map_or("none", DeletionStep::as_str),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result.map(|()| summary)
    }

    fn run_steps(&self, summary: &mut DeletionSummary) -> DeletionResult<()> {
        self.record(summary, DeletionStep::DeleteContactsOfMe, self.delete_contacts_of_me())?;
        self.record(
            summary,
            DeletionStep::DeleteStandardPersonAssociations,
            self.delete_standard_person_associations(),
        )?;
        self.record(
            summary,
            DeletionStep::TombstonePersonAndProfile,
            self.tombstone_person_and_profile(),
        )?;

        match &self.target {
            DeletionTarget::LocalAccount { account, .. } => self.close_user(account, summary),
            DeletionTarget::RemoteIdentity { .. } => Ok(()),
        }
    }

    fn close_user(&self, account: &Account, summary: &mut DeletionSummary) -> DeletionResult<()> {
        self.record(
            summary,
            DeletionStep::DeleteStandardAccountAssociations,
            self.delete_standard_account_associations(account),
        )?;
        self.record(
            summary,
            DeletionStep::DeleteInvitationCode,
            self.delete_invitation_code(account),
        )?;
        self.record(
            summary,
            DeletionStep::RemoveShareVisibilities,
            self.remove_share_visibilities_on_contacts(account),
        )?;
        self.record(
            summary,
            DeletionStep::DisconnectContacts,
            self.disconnect_contacts(account),
        )?;
        self.record(
            summary,
            DeletionStep::TombstoneAccount,
            self.tombstone_account(account),
        )
    }

    fn record(
        &self,
        summary: &mut DeletionSummary,
        step: DeletionStep,
        outcome: DeletionResult<usize>,
    ) -> DeletionResult<()> {
        let affected = outcome?;
        self.reporter.step(step, affected);
        summary.steps.push((step, affected));
        Ok(())
    }

    /// Destroys, page by page, every edge whose target is this person.
    pub fn delete_contacts_of_me(&self) -> DeletionResult<usize> {
        let person_id = self.target.person().id;
        self.destroy_in_batches(
            |after, limit| self.store.contact_ids_targeting_person(person_id, after, limit),
            |id| self.store.destroy_contact(id),
        )
        .map_err(|source| DeletionError::Store {
            step: DeletionStep::DeleteContactsOfMe,
            source,
        })
    }

    /// Bulk-deletes every `normal` person association.
    pub fn delete_standard_person_associations(&self) -> DeletionResult<usize> {
        self.delete_normal_associations(
            EntityKind::Person,
            self.target.person().id,
            DeletionStep::DeleteStandardPersonAssociations,
        )
    }

    /// Clears the profile and locks the person.
    pub fn tombstone_person_and_profile(&self) -> DeletionResult<usize> {
        let person_id = self.target.person().id;
        let store_error = |source: RepoError| DeletionError::Store {
            step: DeletionStep::TombstonePersonAndProfile,
            source,
        };
        self.store.clear_profile(person_id).map_err(store_error)?;
        self.store.lock_person(person_id).map_err(store_error)?;
        Ok(1)
    }

    /// Bulk-deletes every `normal` account association.
    pub fn delete_standard_account_associations(&self, account: &Account) -> DeletionResult<usize> {
        self.delete_normal_associations(
            EntityKind::Account,
            account.id,
            DeletionStep::DeleteStandardAccountAssociations,
        )
    }

    /// Destroys the account's invitation code; a missing code is fine.
    pub fn delete_invitation_code(&self, account: &Account) -> DeletionResult<usize> {
        let store_error = |source: RepoError| DeletionError::Store {
            step: DeletionStep::DeleteInvitationCode,
            source,
        };
        match self.store.invitation_code(account.id).map_err(store_error)? {
            Some(code) => {
                let destroyed = self
                    .store
                    .destroy_invitation_code(code.id)
                    .map_err(store_error)?;
                Ok(usize::from(destroyed))
            }
            None => Ok(0),
        }
    }

    /// Destroys, page by page, visibility grants on the account's edges.
    pub fn remove_share_visibilities_on_contacts(&self, account: &Account) -> DeletionResult<usize> {
        self.destroy_in_batches(
            |after, limit| {
                self.store
                    .share_visibility_ids_for_account(account.id, after, limit)
            },
            |id| self.store.destroy_share_visibility(id),
        )
        .map_err(|source| DeletionError::Store {
            step: DeletionStep::RemoveShareVisibilities,
            source,
        })
    }

    /// Destroys every edge owned by the account in one operation.
    pub fn disconnect_contacts(&self, account: &Account) -> DeletionResult<usize> {
        self.store
            .destroy_contacts_of_account(account.id)
            .map_err(|source| DeletionError::Store {
                step: DeletionStep::DisconnectContacts,
                source,
            })
    }

    /// Scrubs the account row; the row itself stays.
    pub fn tombstone_account(&self, account: &Account) -> DeletionResult<usize> {
        self.store
            .clear_account(account.id, &self.deleted_email_domain)
            .map_err(|source| DeletionError::Store {
                step: DeletionStep::TombstoneAccount,
                source,
            })?;
        Ok(1)
    }

    fn delete_normal_associations(
        &self,
        kind: EntityKind,
        owner_id: i64,
        step: DeletionStep,
    ) -> DeletionResult<usize> {
        let mut deleted = 0;
        let mut failures = Vec::new();

        for association in normal_associations(kind)? {
            let outcome = self
                .store
                .association_ids(kind, owner_id, association)
                .and_then(|ids| self.store.delete_ids(association.table(), &ids));
            match outcome {
                Ok(count) => deleted += count,
                Err(err) => {
                    self.reporter.warn(
                        "deletion",
                        &format!(
                            "{}.{} bulk delete failed for id {owner_id}: {err}",
                            kind.as_str(),
                            association.name
                        ),
                    );
                    failures.push((association.name, err));
                }
            }
        }

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(DeletionError::Associations { step, failures })
        }
    }

    fn destroy_in_batches(
        &self,
        fetch_page: impl Fn(Option<i64>, u32) -> RepoResult<Vec<i64>>,
        destroy: impl Fn(i64) -> RepoResult<bool>,
    ) -> RepoResult<usize> {
        let mut after = None;
        let mut destroyed = 0;
        loop {
            let ids = fetch_page(after, self.batch_size)?;
            let Some(&last) = ids.last() else {
                break;
            };
            for id in &ids {
                if destroy(*id)? {
                    destroyed += 1;
                }
            }
            if ids.len() < self.batch_size as usize {
                break;
            }
            after = Some(last);
        }
        Ok(destroyed)
    }
}
