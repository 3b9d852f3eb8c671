//! Account repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and load local accounts.
//! - Attach export artifacts and manage the account's invitation code.
//!
//! # Invariants
//! - Read paths reject invalid persisted flags instead of masking them.
//! - An account has at most one invitation code.

use crate::model::account::{Account, AccountId, InvitationCode, NewAccount};
use crate::repo::{ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    encrypted_password,
    language,
    getting_started,
    disable_mail,
    strip_exif,
    auto_follow_back,
    auto_follow_back_aspect_id,
    invited_by_id,
    export_path,
    exported_at,
    locked_at
FROM accounts";

/// Repository interface for local accounts.
pub trait AccountRepository {
    fn create_account(&self, account: &NewAccount) -> RepoResult<Account>;
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>>;
    /// Records a generated export archive on the account.
    fn attach_export(&self, id: AccountId, export_path: &str) -> RepoResult<()>;
    /// Creates the account's invitation code, or returns the existing one.
    fn ensure_invitation_code(&self, id: AccountId, token: &str) -> RepoResult<InvitationCode>;
    fn invitation_code(&self, id: AccountId) -> RepoResult<Option<InvitationCode>>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["accounts", "invitation_codes"])?;
        Ok(Self { conn })
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn create_account(&self, account: &NewAccount) -> RepoResult<Account> {
        let username = account.username.trim().to_ascii_lowercase();
        if username.is_empty() {
            return Err(RepoError::InvalidData("username cannot be empty".to_string()));
        }

        self.conn.execute(
            "INSERT INTO accounts (username, email, encrypted_password, language)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                username,
                account.email.trim(),
                account.encrypted_password.as_str(),
                account.language.as_deref(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_account(id)?
            .ok_or_else(|| RepoError::not_found("account", id))
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        load_account(self.conn, &format!("{ACCOUNT_SELECT_SQL} WHERE id = ?1;"), id)
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        load_account(
            self.conn,
            &format!("{ACCOUNT_SELECT_SQL} WHERE username = ?1;"),
            username.trim().to_ascii_lowercase(),
        )
    }

    fn attach_export(&self, id: AccountId, export_path: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                export_path = ?2,
                exported_at = (strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, export_path],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("account", id));
        }
        Ok(())
    }

    fn ensure_invitation_code(&self, id: AccountId, token: &str) -> RepoResult<InvitationCode> {
        self.conn.execute(
            "INSERT OR IGNORE INTO invitation_codes (account_id, token, remaining_uses)
             VALUES (?1, ?2, 0);",
            params![id, token],
        )?;
        self.invitation_code(id)?
            .ok_or_else(|| RepoError::not_found("invitation_code", id))
    }

    fn invitation_code(&self, id: AccountId) -> RepoResult<Option<InvitationCode>> {
        load_invitation_code(self.conn, id)
    }
}

fn load_account<P: rusqlite::ToSql>(
    conn: &Connection,
    sql: &str,
    key: P,
) -> RepoResult<Option<Account>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row([key], |row| Ok(parse_account_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn load_invitation_code(
    conn: &Connection,
    account_id: AccountId,
) -> RepoResult<Option<InvitationCode>> {
    let code = conn
        .query_row(
            "SELECT id, account_id, token, remaining_uses
             FROM invitation_codes
             WHERE account_id = ?1;",
            [account_id],
            |row| {
                Ok(InvitationCode {
                    id: row.get("id")?,
                    account_id: row.get("account_id")?,
                    token: row.get("token")?,
                    remaining_uses: row.get("remaining_uses")?,
                })
            },
        )
        .optional()?;
    Ok(code)
}

pub(crate) fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    Ok(Account {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        encrypted_password: row.get("encrypted_password")?,
        language: row.get("language")?,
        getting_started: int_to_bool(row.get("getting_started")?, "accounts.getting_started")?,
        disable_mail: int_to_bool(row.get("disable_mail")?, "accounts.disable_mail")?,
        strip_exif: int_to_bool(row.get("strip_exif")?, "accounts.strip_exif")?,
        auto_follow_back: int_to_bool(row.get("auto_follow_back")?, "accounts.auto_follow_back")?,
        auto_follow_back_aspect_id: row.get("auto_follow_back_aspect_id")?,
        invited_by_id: row.get("invited_by_id")?,
        export_path: row.get("export_path")?,
        exported_at: row.get("exported_at")?,
        locked_at: row.get("locked_at")?,
    })
}
