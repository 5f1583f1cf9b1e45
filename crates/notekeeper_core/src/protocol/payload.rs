//! Typed payloads carried in envelope `data`.
//!
//! Payload kinds: user credentials (handshake), a single note, a counted
//! note list, and an error message.

use crate::model::note::{Note, NoteList};
use crate::protocol::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A serializable payload with a name used in decode errors.
pub trait Payload: Serialize + DeserializeOwned {
    const NAME: &'static str;
}

/// Handshake payload for AUTH and REGISTER.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

/// Payload of an ERROR envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPayload {
    pub error_text: String,
}

impl Payload for Credentials {
    const NAME: &'static str = "credentials";
}

impl Payload for ErrorPayload {
    const NAME: &'static str = "error";
}

impl Payload for Note {
    const NAME: &'static str = "note";
}

impl Payload for NoteList {
    const NAME: &'static str = "note list";
}

pub fn encode_payload<P: Payload>(payload: &P) -> Vec<u8> {
    match serde_json::to_vec(payload) {
        Ok(bytes) => bytes,
        Err(err) => unreachable!("{} payload always serializes: {err}", P::NAME),
    }
}

pub fn decode_payload<P: Payload>(data: &[u8]) -> Result<P, CodecError> {
    serde_json::from_slice(data).map_err(|source| CodecError::MalformedPayload {
        payload: P::NAME,
        source,
    })
}
