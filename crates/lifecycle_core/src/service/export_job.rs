//! Account export job handler.
//!
//! # Responsibility
//! - Run the external export routine for one account.
//! - Report the outcome through exactly one notification.
//!
//! # Invariants
//! - Success is judged by the reloaded account, not by the routine's return.
//! - Exactly one notification is delivered per invocation, synchronously.
//! - A failed export is an outcome, not an error; only a missing account,
//!   storage failure or failed delivery surfaces as `Err`.

use crate::model::account::{Account, AccountId};
use crate::repo::account_repo::AccountRepository;
use crate::repo::RepoError;
use crate::report::Reporter;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const COMPONENT: &str = "export";

/// Archive generation routine that attaches an export to the account.
pub trait ExportRoutine {
    /// Produces and attaches an export; failure may also be silent.
    fn perform_export(&self, account: &Account) -> Result<(), String>;
}

/// Notification channel for export results.
pub trait ExportMailer {
    fn send_export_complete(&self, account: &Account) -> Result<(), String>;
    fn send_export_failed(&self, account: &Account) -> Result<(), String>;
}

impl<T: ExportRoutine + ?Sized> ExportRoutine for &T {
    fn perform_export(&self, account: &Account) -> Result<(), String> {
        (**self).perform_export(account)
    }
}

impl<T: ExportMailer + ?Sized> ExportMailer for &T {
    fn send_export_complete(&self, account: &Account) -> Result<(), String> {
        (**self).send_export_complete(account)
    }

    fn send_export_failed(&self, account: &Account) -> Result<(), String> {
        (**self).send_export_failed(account)
    }
}

/// Which notification the job sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Complete,
    Failed,
}

#[derive(Debug)]
pub enum ExportJobError {
    AccountNotFound(AccountId),
    Repo(RepoError),
    /// Notification delivery failed; the job infrastructure may retry.
    Delivery {
        outcome: ExportOutcome,
        message: String,
    },
}

impl Display for ExportJobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Delivery { outcome, message } => {
                write!(f, "failed to deliver {outcome:?} export notification: {message}")
            }
        }
    }
}

impl Error for ExportJobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ExportJobError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Export job over an account repository and external collaborators.
pub struct ExportJob<A, X, M, R>
where
    A: AccountRepository,
    X: ExportRoutine,
    M: ExportMailer,
    R: Reporter,
{
    accounts: A,
    routine: X,
    mailer: M,
    reporter: R,
}

impl<A, X, M, R> ExportJob<A, X, M, R>
where
    A: AccountRepository,
    X: ExportRoutine,
    M: ExportMailer,
    R: Reporter,
{
    pub fn new(accounts: A, routine: X, mailer: M, reporter: R) -> Self {
        Self {
            accounts,
            routine,
            mailer,
            reporter,
        }
    }

    /// Runs one export for `account_id` and sends the matching notification.
    pub fn perform(&self, account_id: AccountId) -> Result<ExportOutcome, ExportJobError> {
        let account = self.load(account_id)?;

        if let Err(message) = self.routine.perform_export(&account) {
            self.reporter.warn(
                COMPONENT,
                &format!("export routine failed for account {account_id}: {message}"),
            );
        }

        let reloaded = self.load(account_id)?;
        let (outcome, delivery) = if reloaded.has_export() {
            (
                ExportOutcome::Complete,
                self.mailer.send_export_complete(&reloaded),
            )
        } else {
            (
                ExportOutcome::Failed,
                self.mailer.send_export_failed(&reloaded),
            )
        };
        delivery.map_err(|message| ExportJobError::Delivery { outcome, message })?;

        info!(
            "event=account_export module=export status={} account_id={}",
            match outcome {
                ExportOutcome::Complete => "ok",
                ExportOutcome::Failed => "failed",
            },
            account_id
        );
        Ok(outcome)
    }

    fn load(&self, account_id: AccountId) -> Result<Account, ExportJobError> {
        self.accounts
            .get_account(account_id)?
            .ok_or(ExportJobError::AccountNotFound(account_id))
    }
}
