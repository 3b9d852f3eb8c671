//! Federated identity ("person") and its public profile.
//!
//! # Invariants
//! - `diaspora_handle` is globally unique and stored lowercased.
//! - `closed_account` is the access lock; a closed person is never reopened.

use crate::model::account::AccountId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row id of `people`.
pub type PersonId = i64;

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_.\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*(:[0-9]+)?$").expect("valid handle regex")
});

/// Durable, globally addressable actor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub guid: Uuid,
    /// `user@host` account identifier.
    pub diaspora_handle: String,
    /// Set only for identities hosted here.
    pub owner_id: Option<AccountId>,
    pub pod_id: Option<i64>,
    pub closed_account: bool,
}

impl Person {
    pub fn is_local(&self) -> bool {
        self.owner_id.is_some()
    }

    /// Federation gate: payloads signed by a closed identity are rejected.
    pub fn accepts_federation(&self) -> bool {
        !self.closed_account
    }
}

/// Input for a new identity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub guid: Uuid,
    pub diaspora_handle: String,
    pub owner_id: Option<AccountId>,
    pub pod_id: Option<i64>,
}

impl NewPerson {
    /// Identity hosted on another pod.
    pub fn remote(diaspora_handle: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            diaspora_handle: diaspora_handle.into(),
            owner_id: None,
            pod_id: None,
        }
    }

    /// Identity owned by a local account.
    pub fn local(diaspora_handle: impl Into<String>, owner_id: AccountId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Self::remote(diaspora_handle)
        }
    }
}

/// Public display attributes of a person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub person_id: PersonId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub image_url: Option<String>,
    pub image_url_small: Option<String>,
    pub image_url_medium: Option<String>,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub searchable: bool,
    pub nsfw: bool,
    pub public_details: bool,
}

impl Profile {
    /// Returns whether every identifying field has been emptied.
    pub fn is_cleared(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.full_name,
            &self.image_url,
            &self.image_url_small,
            &self.image_url_medium,
            &self.birthday,
            &self.gender,
            &self.bio,
            &self.location,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, str::is_empty))
            && !self.searchable
    }
}

/// Normalizes a `user@host` handle, returning `None` when it is malformed.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    if HANDLE_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}
