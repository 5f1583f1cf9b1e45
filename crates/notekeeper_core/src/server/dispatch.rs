//! Request dispatch for authenticated sessions.
//!
//! # Responsibility
//! - Map an envelope type code to its note operation through a static route
//!   table.
//! - Scope every operation to the session's bound user.
//! - Build the SUCCESS response payload.
//!
//! # Invariants
//! - Exactly one response envelope per request.
//! - Inner payload decode failures are protocol errors (fatal).
//! - Store failures and codes without a route are domain errors.

use crate::model::note::{Note, UserId};
use crate::protocol::{decode_payload, encode_payload, CodecError, Envelope, MessageType};
use crate::server::error::{DomainError, ProtocolError, SessionError};
use crate::service::note_service::{NoteServiceError, NoteStore};
use std::sync::Arc;

/// Failure of one dispatched request.
#[derive(Debug)]
pub enum DispatchError {
    Protocol(ProtocolError),
    Domain(DomainError),
}

impl From<CodecError> for DispatchError {
    fn from(value: CodecError) -> Self {
        Self::Protocol(value.into())
    }
}

impl From<NoteServiceError> for DispatchError {
    fn from(value: NoteServiceError) -> Self {
        Self::Domain(value.into())
    }
}

impl From<DispatchError> for SessionError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Protocol(err) => Self::Protocol(err),
            DispatchError::Domain(err) => Self::Domain(err),
        }
    }
}

/// Handles one request payload for `owner` and returns the SUCCESS payload.
type Handler = fn(&dyn NoteStore, UserId, &[u8]) -> Result<Vec<u8>, DispatchError>;

struct Route {
    kind: MessageType,
    handler: Handler,
}

const ROUTES: &[Route] = &[
    Route {
        kind: MessageType::NewNote,
        handler: new_note,
    },
    Route {
        kind: MessageType::GetNote,
        handler: get_note,
    },
    Route {
        kind: MessageType::UpdateNote,
        handler: update_note,
    },
    Route {
        kind: MessageType::DeleteNote,
        handler: delete_note,
    },
    Route {
        kind: MessageType::GetAllNotes,
        handler: get_all_notes,
    },
    Route {
        kind: MessageType::GetByTitle,
        handler: get_by_title,
    },
];

/// Routes authenticated-phase envelopes to the Note Store.
#[derive(Clone)]
pub struct Dispatcher {
    notes: Arc<dyn NoteStore>,
}

impl Dispatcher {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }

    /// Handles one request on behalf of `owner`.
    pub fn dispatch(&self, owner: UserId, request: &Envelope) -> Result<Envelope, DispatchError> {
        let route = route_for(request.code).ok_or(DispatchError::Domain(
            DomainError::UnknownMessageCode { code: request.code },
        ))?;
        let data = (route.handler)(self.notes.as_ref(), owner, &request.data)?;
        Ok(Envelope::new(MessageType::Success, data))
    }
}

fn route_for(code: i64) -> Option<&'static Route> {
    let kind = MessageType::from_code(code)?;
    ROUTES.iter().find(|route| route.kind == kind)
}

fn new_note(store: &dyn NoteStore, owner: UserId, data: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let note: Note = decode_payload(data)?;
    store.create(owner, &note.title, &note.body)?;
    Ok(Vec::new())
}

fn get_note(store: &dyn NoteStore, owner: UserId, data: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let request: Note = decode_payload(data)?;
    let note = store.get(owner, request.id)?;
    Ok(encode_payload(&note))
}

fn update_note(
    store: &dyn NoteStore,
    owner: UserId,
    data: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    let note: Note = decode_payload(data)?;
    store.update(owner, note.id, &note.title, &note.body)?;
    Ok(Vec::new())
}

fn delete_note(
    store: &dyn NoteStore,
    owner: UserId,
    data: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    let request: Note = decode_payload(data)?;
    store.delete(owner, request.id)?;
    Ok(Vec::new())
}

fn get_all_notes(
    store: &dyn NoteStore,
    owner: UserId,
    _data: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    let list = store.list(owner)?;
    Ok(encode_payload(&list))
}

fn get_by_title(
    store: &dyn NoteStore,
    owner: UserId,
    data: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    let request: Note = decode_payload(data)?;
    let list = store.search_by_title(owner, &request.title)?;
    Ok(encode_payload(&list))
}
