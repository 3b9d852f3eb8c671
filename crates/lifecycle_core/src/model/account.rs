//! Local account model.
//!
//! # Invariants
//! - A tombstoned account keeps `id`, `username` and creation time so that
//!   authored content keeps a valid owner.
//! - `locked_at` set means no further sign-in is accepted.

use crate::model::contact::AspectId;
use serde::{Deserialize, Serialize};

/// Row id of `accounts`.
pub type AccountId = i64;

/// Email domain used for scrubbed account addresses unless configured.
pub const DEFAULT_DELETED_EMAIL_DOMAIN: &str = "example.org";

/// Operable local login wrapper around a `Person`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Contact address for notifications.
    pub email: String,
    /// `None` once the account has been scrubbed.
    pub encrypted_password: Option<String>,
    pub language: Option<String>,
    pub getting_started: bool,
    pub disable_mail: bool,
    pub strip_exif: bool,
    pub auto_follow_back: bool,
    pub auto_follow_back_aspect_id: Option<AspectId>,
    pub invited_by_id: Option<AccountId>,
    /// Location of the last generated export archive.
    pub export_path: Option<String>,
    /// Epoch ms of the last successful export.
    pub exported_at: Option<i64>,
    /// Epoch ms of the access lock.
    pub locked_at: Option<i64>,
}

impl Account {
    /// Returns whether an export artifact is attached.
    pub fn has_export(&self) -> bool {
        self.export_path
            .as_deref()
            .is_some_and(|path| !path.trim().is_empty())
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Authentication gate used by session code outside this crate.
    pub fn can_sign_in(&self) -> bool {
        !self.is_locked()
            && self
                .encrypted_password
                .as_deref()
                .is_some_and(|hash| !hash.is_empty())
    }
}

/// Registration input for a local account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub encrypted_password: String,
    pub language: Option<String>,
}

impl NewAccount {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        encrypted_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            encrypted_password: encrypted_password.into(),
            language: None,
        }
    }
}

/// One-per-account invitation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationCode {
    pub id: i64,
    pub account_id: AccountId,
    pub token: String,
    pub remaining_uses: i64,
}

/// Placeholder address written over a closed account's email.
pub fn tombstone_email(account_id: AccountId, domain: &str) -> String {
    format!("deletedaccount_{account_id}@{domain}")
}

#[cfg(test)]
mod tests {
    use super::{tombstone_email, Account};

    fn account() -> Account {
        Account {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            encrypted_password: Some("$2a$hash".to_string()),
            language: Some("en".to_string()),
            getting_started: false,
            disable_mail: false,
            strip_exif: true,
            auto_follow_back: false,
            auto_follow_back_aspect_id: None,
            invited_by_id: None,
            export_path: None,
            exported_at: None,
            locked_at: None,
        }
    }

    #[test]
    fn locked_or_passwordless_account_cannot_sign_in() {
        let mut active = account();
        assert!(active.can_sign_in());

        active.locked_at = Some(1);
        assert!(!active.can_sign_in());

        let mut scrubbed = account();
        scrubbed.encrypted_password = None;
        assert!(!scrubbed.can_sign_in());
    }

    #[test]
    fn blank_export_path_is_not_an_export() {
        let mut value = account();
        value.export_path = Some("  ".to_string());
        assert!(!value.has_export());
        value.export_path = Some("exports/alice.json.gz".to_string());
        assert!(value.has_export());
    }

    #[test]
    fn tombstone_email_embeds_id() {
        assert_eq!(
            tombstone_email(42, "example.org"),
            "deletedaccount_42@example.org"
        );
    }
}
