//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide owner-scoped note CRUD and title search over the `notes` table.
//!
//! # Invariants
//! - Every statement filters by `user_id`; a note owned by someone else is
//!   indistinguishable from a missing note (`NotFound`).
//! - Title uniqueness is checked case-sensitively at create time, inside the
//!   same transaction as the insert. Updates do not re-check it.
//! - Listed and searched notes are ordered by `id ASC`.

use crate::model::note::{Note, NoteId, UserId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const NOTE_SELECT_SQL: &str = "SELECT id, user_id, title, data_text FROM notes";

/// Repository interface for owner-scoped note operations.
pub trait NoteRepository {
    /// Inserts a note for `owner` and returns its id.
    fn create_note(&mut self, owner: UserId, title: &str, body: &str) -> RepoResult<NoteId>;
    /// Gets one note by id.
    fn get_note(&self, owner: UserId, id: NoteId) -> RepoResult<Note>;
    /// Replaces title and body of one note.
    fn update_note(&self, owner: UserId, id: NoteId, title: &str, body: &str) -> RepoResult<()>;
    /// Hard-deletes one note.
    fn delete_note(&self, owner: UserId, id: NoteId) -> RepoResult<()>;
    /// Lists all notes of `owner`.
    fn list_notes(&self, owner: UserId) -> RepoResult<Vec<Note>>;
    /// Lists notes of `owner` whose title contains `fragment`.
    fn search_by_title(&self, owner: UserId, fragment: &str) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&mut self, owner: UserId, title: &str, body: &str) -> RepoResult<NoteId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM notes WHERE user_id = ?1 AND title = ?2
            );",
            params![owner, title],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::DuplicateTitle(title.to_string()));
        }

        tx.execute(
            "INSERT INTO notes (user_id, title, data_text) VALUES (?1, ?2, ?3);",
            params![owner, title, body],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(id)
    }

    fn get_note(&self, owner: UserId, id: NoteId) -> RepoResult<Note> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"))?;
        let mut rows = stmt.query(params![id, owner])?;
        match rows.next()? {
            Some(row) => parse_note_row(row),
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn update_note(&self, owner: UserId, id: NoteId, title: &str, body: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET title = ?3, data_text = ?4
             WHERE id = ?1 AND user_id = ?2;",
            params![id, owner, title, body],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_note(&self, owner: UserId, id: NoteId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2;",
            params![id, owner],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn list_notes(&self, owner: UserId) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"))?;
        let mut rows = stmt.query([owner])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn search_by_title(&self, owner: UserId, fragment: &str) -> RepoResult<Vec<Note>> {
        let pattern = format!("%{}%", escape_like(fragment));
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} WHERE user_id = ?1 AND title LIKE ?2 ESCAPE '\\' ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query(params![owner, pattern])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }
}

/// Escapes `LIKE` wildcards so a search fragment matches literally.
pub fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    Ok(Note {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        body: row.get("data_text")?,
    })
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_quotes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
