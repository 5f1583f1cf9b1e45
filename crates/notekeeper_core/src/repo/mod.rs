//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define owner-scoped data access contracts for users and notes.
//! - Isolate SQLite query details from service/session orchestration.
//!
//! # Invariants
//! - Every note query is constrained by the owning `user_id`.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateTitle`,
//!   `DuplicateUser`) in addition to DB transport errors.

use crate::db::DbError;
use crate::model::note::NoteId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for user and note persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No note with this id exists for the requesting owner.
    NotFound(NoteId),
    /// The owner already has a note with exactly this title.
    DuplicateTitle(String),
    /// The user name is already registered.
    DuplicateUser(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::DuplicateTitle(title) => {
                write!(f, "note with \"{title}\" title already exists")
            }
            Self::DuplicateUser(name) => {
                write!(f, "user with \"{name}\" nickname has been registered")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
