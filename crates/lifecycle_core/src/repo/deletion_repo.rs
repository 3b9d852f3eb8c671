//! Store contract used by the deletion cascade, and its SQLite implementation.
//!
//! # Responsibility
//! - Expose exactly the store capabilities the cascade needs: point lookup,
//!   id collection through a declared association, keyed bulk delete, keyset
//!   paging over large result sets, and field scrubbing.
//!
//! # Invariants
//! - Every operation is idempotent: deleting missing ids or re-scrubbing a
//!   scrubbed row changes nothing.
//! - Table and column names interpolated into SQL come only from the static
//!   association registry.

use crate::model::account::{tombstone_email, Account, AccountId, InvitationCode};
use crate::model::association::{Association, EntityKind, Link};
use crate::model::contact::ContactId;
use crate::model::person::{Person, PersonId};
use crate::repo::account_repo::{load_invitation_code, parse_account_row, ACCOUNT_SELECT_SQL};
use crate::repo::person_repo::{parse_person_row, PERSON_SELECT_SQL};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// Upper bound on ids bound into one `DELETE ... IN (...)` statement.
pub const DELETE_CHUNK_SIZE: usize = 500;

/// Row id of `share_visibilities`.
pub type ShareVisibilityId = i64;

/// Store seam of the deletion cascade.
pub trait DeletionStore {
    fn find_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    /// Local account paired with `person`, if it is hosted here.
    fn find_owner_account(&self, person: &Person) -> RepoResult<Option<Account>>;

    /// Ids of edges owned by any account that point at `person_id`.
    ///
    /// Keyset page: ids strictly greater than `after`, ascending, at most `limit`.
    fn contact_ids_targeting_person(
        &self,
        person_id: PersonId,
        after: Option<ContactId>,
        limit: u32,
    ) -> RepoResult<Vec<ContactId>>;
    /// Destroys one edge together with its memberships and visibility grants.
    fn destroy_contact(&self, id: ContactId) -> RepoResult<bool>;
    /// Destroys every edge owned by `account_id` in one statement.
    fn destroy_contacts_of_account(&self, account_id: AccountId) -> RepoResult<usize>;

    /// Collects the ids behind one declared association without loading rows.
    fn association_ids(
        &self,
        kind: EntityKind,
        owner_id: i64,
        association: &Association,
    ) -> RepoResult<Vec<i64>>;
    /// Deletes rows of `table` by id.
    fn delete_ids(&self, table: &'static str, ids: &[i64]) -> RepoResult<usize>;

    /// Keyset page over visibility grants attached to edges of `account_id`.
    fn share_visibility_ids_for_account(
        &self,
        account_id: AccountId,
        after: Option<ShareVisibilityId>,
        limit: u32,
    ) -> RepoResult<Vec<ShareVisibilityId>>;
    fn destroy_share_visibility(&self, id: ShareVisibilityId) -> RepoResult<bool>;

    fn invitation_code(&self, account_id: AccountId) -> RepoResult<Option<InvitationCode>>;
    fn destroy_invitation_code(&self, id: i64) -> RepoResult<bool>;

    /// Empties identifying profile fields and makes the profile unsearchable.
    fn clear_profile(&self, person_id: PersonId) -> RepoResult<()>;
    /// Sets the person's access lock.
    fn lock_person(&self, person_id: PersonId) -> RepoResult<()>;
    /// Scrubs credentials, contact info and preferences; the row stays.
    fn clear_account(&self, account_id: AccountId, deleted_email_domain: &str) -> RepoResult<()>;
}

/// SQLite-backed deletion store.
pub struct SqliteDeletionStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeletionStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "accounts",
                "people",
                "profiles",
                "contacts",
                "share_visibilities",
                "invitation_codes",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl DeletionStore for SqliteDeletionStore<'_> {
    fn find_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        let row = self
            .conn
            .query_row(&format!("{PERSON_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_person_row(row))
            })
            .optional()?;
        row.transpose()
    }

    fn find_owner_account(&self, person: &Person) -> RepoResult<Option<Account>> {
        let Some(owner_id) = person.owner_id else {
            return Ok(None);
        };
        let row = self
            .conn
            .query_row(
                &format!("{ACCOUNT_SELECT_SQL} WHERE id = ?1;"),
                [owner_id],
                |row| Ok(parse_account_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn contact_ids_targeting_person(
        &self,
        person_id: PersonId,
        after: Option<ContactId>,
        limit: u32,
    ) -> RepoResult<Vec<ContactId>> {
        collect_ids(
            self.conn,
            "SELECT id
             FROM contacts
             WHERE person_id = ?1
               AND id > ?2
             ORDER BY id ASC
             LIMIT ?3;",
            params![person_id, after.unwrap_or(0), i64::from(limit)],
        )
    }

    fn destroy_contact(&self, id: ContactId) -> RepoResult<bool> {
        // Memberships and visibility grants go with the edge (ON DELETE CASCADE).
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn destroy_contacts_of_account(&self, account_id: AccountId) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE account_id = ?1;", [account_id])?;
        Ok(changed)
    }

    fn association_ids(
        &self,
        kind: EntityKind,
        owner_id: i64,
        association: &Association,
    ) -> RepoResult<Vec<i64>> {
        match association.link {
            Link::HasMany { table, foreign_key } | Link::HasOne { table, foreign_key } => {
                collect_ids(
                    self.conn,
                    &format!(
                        "SELECT id FROM {} WHERE {} = ?1 ORDER BY id ASC;",
                        checked_identifier(table)?,
                        checked_identifier(foreign_key)?
                    ),
                    [owner_id],
                )
            }
            Link::BelongsTo { foreign_key, .. } => collect_ids(
                self.conn,
                &format!(
                    "SELECT {column} FROM {owner} WHERE id = ?1 AND {column} IS NOT NULL;",
                    column = checked_identifier(foreign_key)?,
                    owner = kind.table()
                ),
                [owner_id],
            ),
            Link::Through { .. } => Err(RepoError::UnsupportedAssociation(association.name)),
        }
    }

    fn delete_ids(&self, table: &'static str, ids: &[i64]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = checked_identifier(table)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            deleted += tx.execute(
                &format!("DELETE FROM {table} WHERE id IN ({placeholders});"),
                params_from_iter(chunk.iter()),
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn share_visibility_ids_for_account(
        &self,
        account_id: AccountId,
        after: Option<ShareVisibilityId>,
        limit: u32,
    ) -> RepoResult<Vec<ShareVisibilityId>> {
        collect_ids(
            self.conn,
            "SELECT sv.id
             FROM share_visibilities sv
             INNER JOIN contacts c ON c.id = sv.contact_id
             WHERE c.account_id = ?1
               AND sv.id > ?2
             ORDER BY sv.id ASC
             LIMIT ?3;",
            params![account_id, after.unwrap_or(0), i64::from(limit)],
        )
    }

    fn destroy_share_visibility(&self, id: ShareVisibilityId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM share_visibilities WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn invitation_code(&self, account_id: AccountId) -> RepoResult<Option<InvitationCode>> {
        load_invitation_code(self.conn, account_id)
    }

    fn destroy_invitation_code(&self, id: i64) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM invitation_codes WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn clear_profile(&self, person_id: PersonId) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE profiles
             SET
                first_name = NULL,
                last_name = NULL,
                full_name = NULL,
                image_url = NULL,
                image_url_small = NULL,
                image_url_medium = NULL,
                birthday = NULL,
                gender = NULL,
                bio = NULL,
                location = NULL,
                searchable = 0,
                nsfw = 0,
                public_details = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE person_id = ?1;",
            [person_id],
        )?;
        Ok(())
    }

    fn lock_person(&self, person_id: PersonId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE people
             SET
                closed_account = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [person_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("person", person_id));
        }
        Ok(())
    }

    fn clear_account(&self, account_id: AccountId, deleted_email_domain: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                email = ?2,
                encrypted_password = NULL,
                authentication_token = NULL,
                reset_password_token = NULL,
                confirm_email_token = NULL,
                unconfirmed_email = NULL,
                remember_created_at = NULL,
                last_sign_in_at = NULL,
                language = NULL,
                getting_started = 0,
                disable_mail = 1,
                strip_exif = 1,
                auto_follow_back = 0,
                auto_follow_back_aspect_id = NULL,
                locked_at = COALESCE(locked_at, strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![account_id, tombstone_email(account_id, deleted_email_domain)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("account", account_id));
        }
        Ok(())
    }
}

fn collect_ids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> RepoResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn checked_identifier(value: &'static str) -> RepoResult<&'static str> {
    if !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
    {
        Ok(value)
    } else {
        Err(RepoError::InvalidData(format!(
            "refusing to interpolate identifier `{value}`"
        )))
    }
}
