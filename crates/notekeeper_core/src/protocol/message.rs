//! Message type codes and the envelope record.

use crate::protocol::payload::{encode_payload, ErrorPayload};
use crate::protocol::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Closed set of envelope type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Error,
    Success,
    Auth,
    Register,
    NewNote,
    GetNote,
    UpdateNote,
    DeleteNote,
    GetAllNotes,
    GetByTitle,
    /// Reserved; never dispatched.
    Logout,
    /// Reserved; never dispatched.
    GetCount,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        Self::Error,
        Self::Success,
        Self::Auth,
        Self::Register,
        Self::NewNote,
        Self::GetNote,
        Self::UpdateNote,
        Self::DeleteNote,
        Self::GetAllNotes,
        Self::GetByTitle,
        Self::Logout,
        Self::GetCount,
    ];

    /// Wire code of this type.
    pub fn code(self) -> i64 {
        match self {
            Self::Error => 0,
            Self::Success => 1,
            Self::Auth => 2,
            Self::Register => 3,
            Self::NewNote => 4,
            Self::GetNote => 5,
            Self::UpdateNote => 6,
            Self::DeleteNote => 7,
            Self::GetAllNotes => 8,
            Self::GetByTitle => 9,
            Self::Logout => 10,
            Self::GetCount => 11,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Stable lowercase name used in log events.
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Auth => "auth",
            Self::Register => "register",
            Self::NewNote => "new_note",
            Self::GetNote => "get_note",
            Self::UpdateNote => "update_note",
            Self::DeleteNote => "delete_note",
            Self::GetAllNotes => "get_all_notes",
            Self::GetByTitle => "get_by_title",
            Self::Logout => "logout",
            Self::GetCount => "get_count",
        }
    }
}

/// Atomic wire unit: a type code plus an opaque, type-dependent payload.
///
/// The code is kept raw so that structurally valid envelopes with unknown
/// codes can still be answered.
///
/// JSON shape: `{"message_type_status": <int>, "data": <base64 string>}`.
/// `Data` is accepted as an alias and a missing/`null` value is an empty
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "message_type_status")]
    pub code: i64,
    #[serde(default, alias = "Data", with = "base64_data")]
    pub data: Vec<u8>,
}

impl Envelope {
    pub fn new(kind: MessageType, data: Vec<u8>) -> Self {
        Self {
            code: kind.code(),
            data,
        }
    }

    /// SUCCESS with an empty payload.
    pub fn success() -> Self {
        Self::new(MessageType::Success, Vec::new())
    }

    /// ERROR carrying a human-readable message.
    pub fn error(error_text: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            error_text: error_text.into(),
        };
        Self::new(MessageType::Error, encode_payload(&payload))
    }

    /// Known message type, if the code belongs to the closed set.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_code(self.code)
    }

    pub fn encode(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(err) => unreachable!("envelope fields always serialize: {err}"),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::MalformedEnvelope)
    }
}

mod base64_data {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
