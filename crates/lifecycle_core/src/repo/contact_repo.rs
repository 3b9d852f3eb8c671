//! Contact/aspect repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create relationship edges with validation.
//! - Resolve aspects by name and manage aspect memberships.
//!
//! # Invariants
//! - Edge creation never bypasses `NewContact::validate`.
//! - Duplicate `(account, person)` edges surface as
//!   `ContactValidationError::AlreadyExists`, not as a raw constraint error.

use crate::model::account::AccountId;
use crate::model::contact::{
    Aspect, AspectId, Contact, ContactId, ContactValidationError, NewContact,
};
use crate::model::person::PersonId;
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const CONTACT_SELECT_SQL: &str = "SELECT id, account_id, person_id, sharing, receiving FROM contacts";
const ASPECT_SELECT_SQL: &str =
    "SELECT id, account_id, name, contacts_visible, order_id FROM aspects";

/// Repository interface for relationship edges and groups.
pub trait ContactRepository {
    /// Validates and inserts one edge.
    fn create_contact(&self, contact: &NewContact) -> RepoResult<Contact>;
    fn find_contact(&self, account_id: AccountId, person_id: PersonId)
        -> RepoResult<Option<Contact>>;
    fn create_aspect(&self, account_id: AccountId, name: &str) -> RepoResult<Aspect>;
    /// Exact-name lookup scoped to the owning account.
    fn find_aspect_by_name(&self, account_id: AccountId, name: &str)
        -> RepoResult<Option<Aspect>>;
    /// Adds an edge to a group; adding twice is a no-op.
    fn add_to_aspect(&self, contact_id: ContactId, aspect_id: AspectId) -> RepoResult<()>;
    /// Group ids the edge belongs to, ordered by id.
    fn aspect_ids_for_contact(&self, contact_id: ContactId) -> RepoResult<Vec<AspectId>>;
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["contacts", "aspects", "aspect_memberships"])?;
        Ok(Self { conn })
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn create_contact(&self, contact: &NewContact) -> RepoResult<Contact> {
        let own_person_id: Option<PersonId> = self
            .conn
            .query_row(
                "SELECT id FROM people WHERE owner_id = ?1;",
                [contact.account_id],
                |row| row.get(0),
            )
            .optional()?;
        contact.validate(own_person_id)?;

        if self
            .find_contact(contact.account_id, contact.person_id)?
            .is_some()
        {
            return Err(ContactValidationError::AlreadyExists {
                account_id: contact.account_id,
                person_id: contact.person_id,
            }
            .into());
        }

        self.conn.execute(
            "INSERT INTO contacts (account_id, person_id, sharing, receiving)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                contact.account_id,
                contact.person_id,
                bool_to_int(contact.sharing),
                bool_to_int(contact.receiving),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        Ok(Contact {
            id,
            account_id: contact.account_id,
            person_id: contact.person_id,
            sharing: contact.sharing,
            receiving: contact.receiving,
        })
    }

    fn find_contact(
        &self,
        account_id: AccountId,
        person_id: PersonId,
    ) -> RepoResult<Option<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL} WHERE account_id = ?1 AND person_id = ?2;"
        ))?;
        let row = stmt
            .query_row(params![account_id, person_id], |row| {
                Ok(parse_contact_row(row))
            })
            .optional()?;
        row.transpose()
    }

    fn create_aspect(&self, account_id: AccountId, name: &str) -> RepoResult<Aspect> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RepoError::InvalidData("aspect name cannot be empty".to_string()));
        }

        self.conn.execute(
            "INSERT INTO aspects (account_id, name, order_id)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(order_id), -1) + 1 FROM aspects WHERE account_id = ?1)
             );",
            params![account_id, trimmed],
        )?;
        let id = self.conn.last_insert_rowid();
        let mut stmt = self
            .conn
            .prepare(&format!("{ASPECT_SELECT_SQL} WHERE id = ?1;"))?;
        let aspect = stmt.query_row([id], |row| Ok(parse_aspect_row(row)))??;
        Ok(aspect)
    }

    fn find_aspect_by_name(
        &self,
        account_id: AccountId,
        name: &str,
    ) -> RepoResult<Option<Aspect>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASPECT_SELECT_SQL} WHERE account_id = ?1 AND name = ?2;"
        ))?;
        let row = stmt
            .query_row(params![account_id, name], |row| Ok(parse_aspect_row(row)))
            .optional()?;
        row.transpose()
    }

    fn add_to_aspect(&self, contact_id: ContactId, aspect_id: AspectId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO aspect_memberships (aspect_id, contact_id)
             VALUES (?1, ?2);",
            params![aspect_id, contact_id],
        )?;
        Ok(())
    }

    fn aspect_ids_for_contact(&self, contact_id: ContactId) -> RepoResult<Vec<AspectId>> {
        let mut stmt = self.conn.prepare(
            "SELECT aspect_id
             FROM aspect_memberships
             WHERE contact_id = ?1
             ORDER BY aspect_id ASC;",
        )?;
        let mut rows = stmt.query([contact_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    Ok(Contact {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        person_id: row.get("person_id")?,
        sharing: int_to_bool(row.get("sharing")?, "contacts.sharing")?,
        receiving: int_to_bool(row.get("receiving")?, "contacts.receiving")?,
    })
}

fn parse_aspect_row(row: &Row<'_>) -> RepoResult<Aspect> {
    Ok(Aspect {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        name: row.get("name")?,
        contacts_visible: int_to_bool(row.get("contacts_visible")?, "aspects.contacts_visible")?,
        order_id: row.get("order_id")?,
    })
}
