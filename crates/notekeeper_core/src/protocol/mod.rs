//! Wire protocol: message types, envelopes, typed payloads and framing.
//!
//! # Responsibility
//! - Encode/decode the `{message_type_status, data}` envelope.
//! - Encode/decode the type-dependent payloads carried in `data`.
//! - Delimit envelopes on a byte stream with a length prefix.
//!
//! # Invariants
//! - One `write_frame` is read back by exactly one `read_frame`, however the
//!   transport splits or coalesces the bytes.
//! - Encoding well-formed in-memory values never fails.
//! - Decoding never panics on arbitrary input.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod frame;
pub mod message;
pub mod payload;

pub use frame::{read_frame, write_envelope, write_frame, FrameError};
pub use message::{Envelope, MessageType};
pub use payload::{decode_payload, encode_payload, Credentials, ErrorPayload, Payload};

/// Decode failure for an envelope or its payload.
#[derive(Debug)]
pub enum CodecError {
    /// Bytes are not a valid `{message_type_status, data}` record.
    MalformedEnvelope(serde_json::Error),
    /// Envelope `data` is not a valid payload of the expected shape.
    MalformedPayload {
        payload: &'static str,
        source: serde_json::Error,
    },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedEnvelope(err) => write!(f, "malformed envelope: {err}"),
            Self::MalformedPayload { payload, source } => {
                write!(f, "malformed {payload} payload: {source}")
            }
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedEnvelope(err) => Some(err),
            Self::MalformedPayload { source, .. } => Some(source),
        }
    }
}
