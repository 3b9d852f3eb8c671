//! Declared relationship types of `Account` and `Person`.
//!
//! # Responsibility
//! - Describe, as data, every association the two root entities have.
//! - Tell the store how to collect the ids behind a direct association.
//!
//! # Invariants
//! - Names are unique per entity.
//! - Every foreign key in the live schema that touches `accounts` or `people`
//!   is described by exactly one direct association of the matching entity.
//! - `Through` associations name another association of the same entity.

/// Root entity owning a set of associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Account,
    Person,
}

impl EntityKind {
    /// Backing table of the entity.
    pub fn table(self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::Person => "people",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Person => "person",
        }
    }

    pub fn all() -> [EntityKind; 2] {
        [Self::Account, Self::Person]
    }
}

/// How an association reaches its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Rows of `table` whose `foreign_key` equals the owner id.
    HasMany {
        table: &'static str,
        foreign_key: &'static str,
    },
    /// At most one row of `table` whose `foreign_key` equals the owner id.
    HasOne {
        table: &'static str,
        foreign_key: &'static str,
    },
    /// `foreign_key` on the owner row points at one row of `table`.
    BelongsTo {
        table: &'static str,
        foreign_key: &'static str,
    },
    /// Rows of `table` reached via the association named `through`.
    Through {
        through: &'static str,
        table: &'static str,
    },
}

/// One declared relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub name: &'static str,
    pub link: Link,
}

impl Association {
    /// Target table of the association.
    pub fn table(&self) -> &'static str {
        match self.link {
            Link::HasMany { table, .. }
            | Link::HasOne { table, .. }
            | Link::BelongsTo { table, .. }
            | Link::Through { table, .. } => table,
        }
    }

    /// Whether ids can be collected with one keyed query on the target table.
    pub fn is_collectable(&self) -> bool {
        matches!(self.link, Link::HasMany { .. } | Link::HasOne { .. })
    }

    /// `(table, column)` of the foreign key backing this association.
    ///
    /// `owner_table` is needed for `BelongsTo`, whose key lives on the owner.
    pub fn foreign_key_column(&self, owner_table: &'static str) -> Option<(&'static str, &'static str)> {
        match self.link {
            Link::HasMany { table, foreign_key } | Link::HasOne { table, foreign_key } => {
                Some((table, foreign_key))
            }
            Link::BelongsTo { foreign_key, .. } => Some((owner_table, foreign_key)),
            Link::Through { .. } => None,
        }
    }
}

const fn has_many(name: &'static str, table: &'static str, foreign_key: &'static str) -> Association {
    Association {
        name,
        link: Link::HasMany { table, foreign_key },
    }
}

const fn has_one(name: &'static str, table: &'static str, foreign_key: &'static str) -> Association {
    Association {
        name,
        link: Link::HasOne { table, foreign_key },
    }
}

const fn belongs_to(name: &'static str, table: &'static str, foreign_key: &'static str) -> Association {
    Association {
        name,
        link: Link::BelongsTo { table, foreign_key },
    }
}

const fn through(name: &'static str, via: &'static str, table: &'static str) -> Association {
    Association {
        name,
        link: Link::Through {
            through: via,
            table,
        },
    }
}

/// Relationship types declared on `Account`.
pub const ACCOUNT_ASSOCIATIONS: &[Association] = &[
    has_one("person", "people", "owner_id"),
    through("profile", "person", "profiles"),
    has_many("contacts", "contacts", "account_id"),
    through("contact_people", "contacts", "people"),
    has_many("aspects", "aspects", "account_id"),
    through("aspect_memberships", "aspects", "aspect_memberships"),
    belongs_to("auto_follow_back_aspect", "aspects", "auto_follow_back_aspect_id"),
    has_one("invitation_code", "invitation_codes", "account_id"),
    belongs_to("invited_by", "accounts", "invited_by_id"),
    has_many("invited_users", "accounts", "invited_by_id"),
    has_many("tag_followings", "tag_followings", "account_id"),
    through("followed_tags", "tag_followings", "tags"),
    has_many("services", "services", "account_id"),
    has_many("user_preferences", "user_preferences", "account_id"),
    has_many("notifications", "notifications", "recipient_id"),
    has_many("blocks", "blocks", "account_id"),
    through("ignored_people", "blocks", "people"),
    through("share_visibilities", "contacts", "share_visibilities"),
    through("conversation_visibilities", "person", "conversation_visibilities"),
    through("conversations", "conversation_visibilities", "conversations"),
    has_many("authorizations", "authorizations", "account_id"),
    has_many("o_auth_applications", "o_auth_applications", "account_id"),
    has_many(
        "pairwise_pseudonymous_identifiers",
        "pairwise_pseudonymous_identifiers",
        "account_id",
    ),
    has_many("reports", "reports", "account_id"),
];

/// Relationship types declared on `Person`.
pub const PERSON_ASSOCIATIONS: &[Association] = &[
    has_one("profile", "profiles", "person_id"),
    belongs_to("owner", "accounts", "owner_id"),
    belongs_to("pod", "pods", "pod_id"),
    has_many("contacts", "contacts", "person_id"),
    has_many("posts", "posts", "author_id"),
    has_many("photos", "photos", "author_id"),
    has_many("comments", "comments", "author_id"),
    has_many("likes", "likes", "author_id"),
    has_many("poll_participations", "poll_participations", "author_id"),
    has_many("mentions", "mentions", "person_id"),
    has_many("participations", "participations", "author_id"),
    has_many("roles", "roles", "person_id"),
    has_many("blocks", "blocks", "person_id"),
    has_many("notification_actors", "notification_actors", "person_id"),
    through("notifications", "notification_actors", "notifications"),
    has_many("conversations", "conversations", "author_id"),
    has_many("conversation_visibilities", "conversation_visibilities", "person_id"),
    has_many("messages", "messages", "author_id"),
    has_one("account_deletion", "account_deletions", "person_id"),
    has_one("account_migration", "account_migrations", "old_person_id"),
];

/// Every association declared on `kind`.
pub fn declared_associations(kind: EntityKind) -> &'static [Association] {
    match kind {
        EntityKind::Account => ACCOUNT_ASSOCIATIONS,
        EntityKind::Person => PERSON_ASSOCIATIONS,
    }
}

/// Looks up one declared association by name.
pub fn find_association(kind: EntityKind, name: &str) -> Option<&'static Association> {
    declared_associations(kind)
        .iter()
        .find(|association| association.name == name)
}

#[cfg(test)]
mod tests {
    use super::{declared_associations, find_association, EntityKind, Link};
    use std::collections::BTreeSet;

    #[test]
    fn names_are_unique_per_entity() {
        for kind in EntityKind::all() {
            let associations = declared_associations(kind);
            let names: BTreeSet<_> = associations.iter().map(|a| a.name).collect();
            assert_eq!(names.len(), associations.len(), "{kind:?} has duplicate names");
        }
    }

    #[test]
    fn through_associations_name_a_declared_association() {
        for kind in EntityKind::all() {
            for association in declared_associations(kind) {
                if let Link::Through { through, .. } = association.link {
                    assert!(
                        find_association(kind, through).is_some(),
                        "{kind:?}.{} goes through unknown `{through}`",
                        association.name
                    );
                }
            }
        }
    }

    #[test]
    fn belongs_to_key_lives_on_owner_table() {
        let invited_by = find_association(EntityKind::Account, "invited_by").unwrap();
        assert_eq!(
            invited_by.foreign_key_column(EntityKind::Account.table()),
            Some(("accounts", "invited_by_id"))
        );
        assert!(!invited_by.is_collectable());
    }
}
