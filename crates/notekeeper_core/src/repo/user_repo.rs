//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - `user_name` uniqueness is enforced both by a pre-insert check and by
//!   the `UNIQUE` column constraint.
//! - Stored passwords are opaque hashes produced by the credential service.

use crate::model::note::UserId;
use crate::model::user::User;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};

/// Repository interface for account lookup and registration.
pub trait UserRepository {
    /// Inserts a new account and returns its id.
    fn create_user(&mut self, user_name: &str, password_hash: &str) -> RepoResult<UserId>;
    /// Looks up one account by its unique name.
    fn find_by_name(&self, user_name: &str) -> RepoResult<Option<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&mut self, user_name: &str, password_hash: &str) -> RepoResult<UserId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_name = ?1);",
            [user_name],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::DuplicateUser(user_name.to_string()));
        }

        match tx.execute(
            "INSERT INTO users (user_name, password) VALUES (?1, ?2);",
            params![user_name, password_hash],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(RepoError::DuplicateUser(user_name.to_string()));
            }
            Err(err) => return Err(err.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(id)
    }

    fn find_by_name(&self, user_name: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_name, password FROM users WHERE user_name = ?1;")?;
        let mut rows = stmt.query([user_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(User {
                id: row.get("id")?,
                user_name: row.get("user_name")?,
                password_hash: row.get("password")?,
            }));
        }

        Ok(None)
    }
}
