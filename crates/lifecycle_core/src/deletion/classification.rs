//! Classification of every declared association into a deletion policy.
//!
//! # Responsibility
//! - Hold the versioned table that assigns each association of `Account` and
//!   `Person` to exactly one of `normal`, `special` or `ignored`.
//! - Detect registry drift: unclassified names, double classification, names
//!   that are not declared, and live foreign keys with no declared association.
//!
//! # Invariants
//! - `normal ∪ special ∪ ignored` equals the declared association names of the
//!   entity, and the three sets are disjoint.
//! - Every `normal` association is collectable by one keyed query.
//! - `CLASSIFIED_SCHEMA_VERSION` equals the latest migration; adding a
//!   migration forces a review of this table.

use crate::db::migrations::current_user_version;
use crate::db::schema::foreign_keys;
use crate::db::DbError;
use crate::model::association::{declared_associations, find_association, Association, EntityKind, Link};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Schema version this table was last reviewed against.
pub const CLASSIFIED_SCHEMA_VERSION: u32 = 3;

/// Deletion policy of one association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Removed by the generic id-collection bulk delete.
    Normal,
    /// Handled by a dedicated cascade step.
    Special,
    /// Left untouched on purpose.
    Ignored,
}

/// Per-entity classification table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationTable {
    pub normal: &'static [&'static str],
    pub special: &'static [&'static str],
    pub ignored: &'static [&'static str],
}

impl ClassificationTable {
    fn groups(&self) -> [(Classification, &'static [&'static str]); 3] {
        [
            (Classification::Normal, self.normal),
            (Classification::Special, self.special),
            (Classification::Ignored, self.ignored),
        ]
    }
}

pub const ACCOUNT_CLASSIFICATION: ClassificationTable = ClassificationTable {
    normal: &[
        "tag_followings",
        "services",
        "aspects",
        "user_preferences",
        "notifications",
        "blocks",
        "authorizations",
        "o_auth_applications",
        "pairwise_pseudonymous_identifiers",
    ],
    special: &[
        "person",
        "profile",
        "contacts",
        "auto_follow_back_aspect",
        "invitation_code",
    ],
    // Authored/shared rows must outlive the account, or another subsystem
    // (tags, invitations, moderation, conversations) owns their cleanup.
    ignored: &[
        "followed_tags",
        "invited_by",
        "invited_users",
        "contact_people",
        "aspect_memberships",
        "ignored_people",
        "share_visibilities",
        "conversation_visibilities",
        "conversations",
        "reports",
    ],
};

pub const PERSON_CLASSIFICATION: ClassificationTable = ClassificationTable {
    normal: &[
        "posts",
        "photos",
        "mentions",
        "participations",
        "roles",
        "blocks",
        "conversation_visibilities",
    ],
    special: &["profile", "contacts"],
    ignored: &[
        "comments",
        "likes",
        "poll_participations",
        "notification_actors",
        "notifications",
        "owner",
        "pod",
        "conversations",
        "messages",
        "account_deletion",
        "account_migration",
    ],
};

pub fn classification_table(kind: EntityKind) -> &'static ClassificationTable {
    match kind {
        EntityKind::Account => &ACCOUNT_CLASSIFICATION,
        EntityKind::Person => &PERSON_CLASSIFICATION,
    }
}

/// Returns the first classification listing `name`.
pub fn classify(kind: EntityKind, name: &str) -> Option<Classification> {
    classification_table(kind)
        .groups()
        .into_iter()
        .find(|(_, names)| names.contains(&name))
        .map(|(classification, _)| classification)
}

/// Declared associations removed by the generic bulk delete, in table order.
pub fn normal_associations(kind: EntityKind) -> Result<Vec<&'static Association>, RegistryError> {
    let mut problems = Vec::new();
    let mut associations = Vec::new();
    for &name in classification_table(kind).normal {
        match find_association(kind, name) {
            Some(association) if association.is_collectable() => associations.push(association),
            Some(_) => problems.push(RegistryProblem::NotCollectable { kind, name }),
            None => problems.push(RegistryProblem::UnknownName { kind, name }),
        }
    }
    if problems.is_empty() {
        Ok(associations)
    } else {
        Err(RegistryError::Mismatch(problems))
    }
}

/// One registry inconsistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryProblem {
    /// Declared but present in none of the three sets.
    Unclassified { kind: EntityKind, name: &'static str },
    /// Listed more than once across the three sets.
    ClassifiedTwice { kind: EntityKind, name: &'static str },
    /// Classified but not declared.
    UnknownName { kind: EntityKind, name: &'static str },
    /// Classified `normal` but not reachable by one keyed query.
    NotCollectable { kind: EntityKind, name: &'static str },
    /// Live foreign key with no declared association.
    UndeclaredForeignKey {
        kind: EntityKind,
        table: String,
        column: String,
    },
    /// Declared direct association with no live foreign key.
    MissingForeignKey {
        kind: EntityKind,
        name: &'static str,
        table: &'static str,
        column: &'static str,
    },
    /// Table reviewed against an older or newer schema than the database.
    SchemaVersion { classified: u32, database: u32 },
}

impl Display for RegistryProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unclassified { kind, name } => {
                write!(f, "{}.{name} is not classified", kind.as_str())
            }
            Self::ClassifiedTwice { kind, name } => {
                write!(f, "{}.{name} is classified more than once", kind.as_str())
            }
            Self::UnknownName { kind, name } => {
                write!(f, "{}.{name} is classified but not declared", kind.as_str())
            }
            Self::NotCollectable { kind, name } => write!(
                f,
                "{}.{name} is normal but cannot be collected by key",
                kind.as_str()
            ),
            Self::UndeclaredForeignKey {
                kind,
                table,
                column,
            } => write!(
                f,
                "foreign key {table}.{column} touches {} but no association declares it",
                kind.table()
            ),
            Self::MissingForeignKey {
                kind,
                name,
                table,
                column,
            } => write!(
                f,
                "{}.{name} expects foreign key {table}.{column} which the schema lacks",
                kind.as_str()
            ),
            Self::SchemaVersion {
                classified,
                database,
            } => write!(
                f,
                "classification reviewed for schema {classified}, database is at {database}"
            ),
        }
    }
}

#[derive(Debug)]
pub enum RegistryError {
    Mismatch(Vec<RegistryProblem>),
    Db(DbError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch(problems) => {
                write!(f, "association registry mismatch:")?;
                for problem in problems {
                    write!(f, " [{problem}]")?;
                }
                Ok(())
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mismatch(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Checks that the classification of `kind` partitions its declared names.
pub fn classification_problems(kind: EntityKind) -> Vec<RegistryProblem> {
    let declared: BTreeSet<&'static str> =
        declared_associations(kind).iter().map(|a| a.name).collect();
    let mut seen = BTreeSet::new();
    let mut problems = Vec::new();

    for (classification, names) in classification_table(kind).groups() {
        for &name in names {
            if !seen.insert(name) {
                problems.push(RegistryProblem::ClassifiedTwice { kind, name });
            }
            if !declared.contains(&name) {
                problems.push(RegistryProblem::UnknownName { kind, name });
            } else if classification == Classification::Normal
                && find_association(kind, name).is_some_and(|a| !a.is_collectable())
            {
                problems.push(RegistryProblem::NotCollectable { kind, name });
            }
        }
    }

    for &name in declared.difference(&seen) {
        problems.push(RegistryProblem::Unclassified { kind, name });
    }
    problems
}

/// Compares declared direct associations of `kind` with live foreign keys.
pub fn schema_problems(conn: &Connection, kind: EntityKind) -> Result<Vec<RegistryProblem>, DbError> {
    let owner = kind.table();
    let live = foreign_keys(conn)?;

    // (table, column) of keys pointing at the entity, and columns on the entity.
    let live_inbound: BTreeSet<(String, String)> = live
        .iter()
        .filter(|key| key.references == owner)
        .map(|key| (key.table.clone(), key.column.clone()))
        .collect();
    let live_outbound: BTreeSet<String> = live
        .iter()
        .filter(|key| key.table == owner)
        .map(|key| key.column.clone())
        .collect();

    let mut declared_inbound = BTreeSet::new();
    let mut declared_outbound = BTreeSet::new();
    let mut problems = Vec::new();

    for association in declared_associations(kind) {
        match association.link {
            Link::HasMany { table, foreign_key } | Link::HasOne { table, foreign_key } => {
                declared_inbound.insert((table.to_string(), foreign_key.to_string()));
                if !live_inbound.contains(&(table.to_string(), foreign_key.to_string())) {
                    problems.push(RegistryProblem::MissingForeignKey {
                        kind,
                        name: association.name,
                        table,
                        column: foreign_key,
                    });
                }
            }
            Link::BelongsTo { foreign_key, .. } => {
                declared_outbound.insert(foreign_key.to_string());
                if !live_outbound.contains(foreign_key) {
                    problems.push(RegistryProblem::MissingForeignKey {
                        kind,
                        name: association.name,
                        table: owner,
                        column: foreign_key,
                    });
                }
            }
            Link::Through { .. } => {}
        }
    }

    for (table, column) in live_inbound.difference(&declared_inbound) {
        problems.push(RegistryProblem::UndeclaredForeignKey {
            kind,
            table: table.clone(),
            column: column.clone(),
        });
    }
    for column in live_outbound.difference(&declared_outbound) {
        problems.push(RegistryProblem::UndeclaredForeignKey {
            kind,
            table: owner.to_string(),
            column: column.clone(),
        });
    }
    Ok(problems)
}

/// Full registry check: classification partition plus live-schema coverage.
pub fn verify_registry(conn: &Connection) -> Result<(), RegistryError> {
    let mut problems = Vec::new();

    let database = current_user_version(conn)?;
    if database != CLASSIFIED_SCHEMA_VERSION {
        problems.push(RegistryProblem::SchemaVersion {
            classified: CLASSIFIED_SCHEMA_VERSION,
            database,
        });
    }

    for kind in EntityKind::all() {
        problems.extend(classification_problems(kind));
        problems.extend(schema_problems(conn, kind)?);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Mismatch(problems))
    }
}
