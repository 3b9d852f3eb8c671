//! Person/profile repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and resolve federated identities by id, handle or owner.
//! - Read and write the 1:1 profile row.
//!
//! # Invariants
//! - Creating a person always creates its (empty) profile in the same
//!   transaction.
//! - Handles are persisted in normalized lowercase form.

use crate::model::person::{normalize_handle, NewPerson, Person, PersonId, Profile};
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub(crate) const PERSON_SELECT_SQL: &str = "SELECT
    id,
    guid,
    diaspora_handle,
    owner_id,
    pod_id,
    closed_account
FROM people";

const PROFILE_SELECT_SQL: &str = "SELECT
    id,
    person_id,
    first_name,
    last_name,
    full_name,
    image_url,
    image_url_small,
    image_url_medium,
    birthday,
    gender,
    bio,
    location,
    searchable,
    nsfw,
    public_details
FROM profiles";

/// Repository interface for identities and profiles.
pub trait PersonRepository {
    /// Creates one person plus its empty profile.
    fn create_person(&self, person: &NewPerson) -> RepoResult<Person>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    /// Resolves a person by global `user@host` handle.
    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Person>>;
    fn get_profile(&self, person_id: PersonId) -> RepoResult<Option<Profile>>;
    /// Overwrites the public profile fields.
    fn update_profile(&self, profile: &Profile) -> RepoResult<()>;
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["people", "profiles"])?;
        Ok(Self { conn })
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn create_person(&self, person: &NewPerson) -> RepoResult<Person> {
        let handle = normalize_handle(&person.diaspora_handle).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid account handle `{}`",
                person.diaspora_handle
            ))
        })?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO people (guid, diaspora_handle, owner_id, pod_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                person.guid.to_string(),
                handle,
                person.owner_id,
                person.pod_id
            ],
        )?;
        let person_id = tx.last_insert_rowid();
        tx.execute("INSERT INTO profiles (person_id) VALUES (?1);", [person_id])?;
        tx.commit()?;

        self.get_person(person_id)?
            .ok_or_else(|| RepoError::not_found("person", person_id))
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        load_person(self.conn, &format!("{PERSON_SELECT_SQL} WHERE id = ?1;"), id)
    }

    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Person>> {
        let Some(normalized) = normalize_handle(handle) else {
            return Ok(None);
        };
        load_person(
            self.conn,
            &format!("{PERSON_SELECT_SQL} WHERE diaspora_handle = ?1;"),
            normalized,
        )
    }

    fn get_profile(&self, person_id: PersonId) -> RepoResult<Option<Profile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE person_id = ?1;"))?;
        let mut rows = stmt.query([person_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_profile_row(row)?));
        }
        Ok(None)
    }

    fn update_profile(&self, profile: &Profile) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE profiles
             SET
                first_name = ?2,
                last_name = ?3,
                full_name = ?4,
                image_url = ?5,
                image_url_small = ?6,
                image_url_medium = ?7,
                birthday = ?8,
                gender = ?9,
                bio = ?10,
                location = ?11,
                searchable = ?12,
                nsfw = ?13,
                public_details = ?14,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE person_id = ?1;",
            params![
                profile.person_id,
                profile.first_name,
                profile.last_name,
                profile.full_name,
                profile.image_url,
                profile.image_url_small,
                profile.image_url_medium,
                profile.birthday,
                profile.gender,
                profile.bio,
                profile.location,
                bool_to_int(profile.searchable),
                bool_to_int(profile.nsfw),
                bool_to_int(profile.public_details),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("profile", profile.person_id));
        }
        Ok(())
    }
}

fn load_person<P: rusqlite::ToSql>(
    conn: &Connection,
    sql: &str,
    key: P,
) -> RepoResult<Option<Person>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row([key], |row| Ok(parse_person_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let guid_text: String = row.get("guid")?;
    let guid = Uuid::parse_str(&guid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{guid_text}` in people.guid"))
    })?;

    Ok(Person {
        id: row.get("id")?,
        guid,
        diaspora_handle: row.get("diaspora_handle")?,
        owner_id: row.get("owner_id")?,
        pod_id: row.get("pod_id")?,
        closed_account: int_to_bool(row.get("closed_account")?, "people.closed_account")?,
    })
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<Profile> {
    Ok(Profile {
        id: row.get("id")?,
        person_id: row.get("person_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        full_name: row.get("full_name")?,
        image_url: row.get("image_url")?,
        image_url_small: row.get("image_url_small")?,
        image_url_medium: row.get("image_url_medium")?,
        birthday: row.get("birthday")?,
        gender: row.get("gender")?,
        bio: row.get("bio")?,
        location: row.get("location")?,
        searchable: int_to_bool(row.get("searchable")?, "profiles.searchable")?,
        nsfw: int_to_bool(row.get("nsfw")?, "profiles.nsfw")?,
        public_details: int_to_bool(row.get("public_details")?, "profiles.public_details")?,
    })
}
