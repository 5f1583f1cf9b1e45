//! Note Store: owner-scoped note use-cases over the shared connection.
//!
//! # Responsibility
//! - Provide create/get/update/delete/list/search operations, each scoped to
//!   the requesting owner.
//! - Translate repository errors into note-level failures.
//!
//! # Invariants
//! - Each call holds the connection lock for its whole duration, so every
//!   operation is atomic with respect to other sessions.
//! - `NoteList::count` always equals `NoteList::notes.len()`.

use crate::db::SharedConnection;
use crate::model::note::{Note, NoteId, NoteList, UserId};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// The owner already has a note with this exact title.
    DuplicateTitle(String),
    /// Target note does not exist for this owner.
    NoteNotFound(NoteId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTitle(title) => write!(f, "note with \"{title}\" name already exists"),
            Self::NoteNotFound(id) => write!(f, "note {id} not found"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            RepoError::DuplicateTitle(title) => Self::DuplicateTitle(title),
            other => Self::Repo(other),
        }
    }
}

pub type NoteServiceResult<T> = Result<T, NoteServiceError>;

/// Owner-scoped note persistence, safe for concurrent sessions.
pub trait NoteStore: Send + Sync {
    fn create(&self, owner: UserId, title: &str, body: &str) -> NoteServiceResult<NoteId>;
    fn get(&self, owner: UserId, id: NoteId) -> NoteServiceResult<Note>;
    /// Replaces title and body; title uniqueness is not re-checked.
    fn update(&self, owner: UserId, id: NoteId, title: &str, body: &str) -> NoteServiceResult<()>;
    fn delete(&self, owner: UserId, id: NoteId) -> NoteServiceResult<()>;
    fn list(&self, owner: UserId) -> NoteServiceResult<NoteList>;
    /// Substring match on title.
    fn search_by_title(&self, owner: UserId, fragment: &str) -> NoteServiceResult<NoteList>;
}

/// Note Store backed by the shared SQLite connection.
pub struct SqliteNoteStore {
    conn: SharedConnection,
}

impl SqliteNoteStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn with_repo<T>(
        &self,
        op: impl FnOnce(&mut SqliteNoteRepository<'_>) -> Result<T, RepoError>,
    ) -> NoteServiceResult<T> {
        let mut conn = self.conn.lock();
        let mut repo = SqliteNoteRepository::new(&mut conn);
        Ok(op(&mut repo)?)
    }
}

impl NoteStore for SqliteNoteStore {
    fn create(&self, owner: UserId, title: &str, body: &str) -> NoteServiceResult<NoteId> {
        self.with_repo(|repo| repo.create_note(owner, title, body))
    }

    fn get(&self, owner: UserId, id: NoteId) -> NoteServiceResult<Note> {
        self.with_repo(|repo| repo.get_note(owner, id))
    }

    fn update(&self, owner: UserId, id: NoteId, title: &str, body: &str) -> NoteServiceResult<()> {
        self.with_repo(|repo| repo.update_note(owner, id, title, body))
    }

    fn delete(&self, owner: UserId, id: NoteId) -> NoteServiceResult<()> {
        self.with_repo(|repo| repo.delete_note(owner, id))
    }

    fn list(&self, owner: UserId) -> NoteServiceResult<NoteList> {
        self.with_repo(|repo| repo.list_notes(owner)).map(NoteList::from)
    }

    fn search_by_title(&self, owner: UserId, fragment: &str) -> NoteServiceResult<NoteList> {
        self.with_repo(|repo| repo.search_by_title(owner, fragment))
            .map(NoteList::from)
    }
}
