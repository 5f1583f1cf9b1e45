//! Note domain model.
//!
//! # Responsibility
//! - Define the note record persisted by the store and carried on the wire.
//!
//! # Invariants
//! - `user_id` is the owning user; it is set by the server from the
//!   authenticated session, never trusted from client input.
//! - `id` is assigned by storage and never reused for another note.

use serde::{Deserialize, Serialize};

/// Storage-assigned note identifier.
pub type NoteId = i64;

/// Owning user identifier.
pub type UserId = i64;

/// One user-owned note.
///
/// Field names follow the external wire schema. Absent fields deserialize to
/// defaults so that request payloads may carry only the fields an operation
/// needs (e.g. just `Id` for a lookup).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    #[serde(rename = "Id")]
    pub id: NoteId,
    #[serde(rename = "user_id")]
    pub user_id: UserId,
    pub title: String,
    /// Note body text.
    #[serde(rename = "data_text")]
    pub body: String,
}

impl Note {
    /// Builds a note draft that has not been persisted yet.
    pub fn draft(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Builds a request payload that only identifies a note.
    pub fn reference(id: NoteId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Owner-scoped listing result, in storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteList {
    /// Number of notes in `notes`.
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Notes")]
    pub notes: Vec<Note>,
}

impl From<Vec<Note>> for NoteList {
    fn from(notes: Vec<Note>) -> Self {
        Self {
            count: notes.len(),
            notes,
        }
    }
}
