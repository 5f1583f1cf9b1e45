//! Session error taxonomy.
//!
//! # Responsibility
//! - Classify every session failure as transport, protocol or domain.
//! - Carry structured context; wire text is produced only by `Display` when
//!   an ERROR envelope is built.
//!
//! # Invariants
//! - Transport failures are never reported to the peer.
//! - Protocol failures are reported best-effort and always end the session.
//! - Domain failures are reported; they end the session only during the
//!   handshake.

use crate::model::note::NoteId;
use crate::protocol::{CodecError, FrameError};
use crate::service::auth_service::AuthServiceError;
use crate::service::note_service::NoteServiceError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Business-rule failure, answered with an ERROR envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Authentication failed: no such user.
    UserNotFound { user_name: String },
    /// Authentication failed: password mismatch.
    WrongPassword,
    /// Registration failed: name already taken.
    DuplicateUser { user_name: String },
    /// Registration failed: empty user name or password.
    EmptyCredentials,
    DuplicateTitle { title: String },
    /// Missing, or owned by another user; the two are indistinguishable.
    NoteNotFound { id: NoteId },
    UnknownMessageCode { code: i64 },
    /// Encoded response exceeds the frame size limit.
    ResponseTooLarge { size: usize, max: usize },
    /// Store or credential backend failure.
    Storage { detail: String },
}

impl DomainError {
    /// Stable identifier for log events; never contains user data.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound { .. } => "user_not_found",
            Self::WrongPassword => "wrong_password",
            Self::DuplicateUser { .. } => "duplicate_user",
            Self::EmptyCredentials => "empty_credentials",
            Self::DuplicateTitle { .. } => "duplicate_title",
            Self::NoteNotFound { .. } => "note_not_found",
            Self::UnknownMessageCode { .. } => "unknown_message_code",
            Self::ResponseTooLarge { .. } => "response_too_large",
            Self::Storage { .. } => "storage_failure",
        }
    }
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound { user_name } => write!(f, "user \"{user_name}\" not found"),
            Self::WrongPassword => write!(f, "wrong password"),
            Self::DuplicateUser { user_name } => {
                write!(f, "user with \"{user_name}\" nickname has been registered")
            }
            Self::EmptyCredentials => write!(f, "user name and password must not be empty"),
            Self::DuplicateTitle { title } => {
                write!(f, "note with \"{title}\" name already exists")
            }
            Self::NoteNotFound { id } => write!(f, "note {id} not found"),
            Self::UnknownMessageCode { code } => {
                write!(f, "unknown server message code: {code}")
            }
            Self::ResponseTooLarge { size, max } => {
                write!(f, "response too large: {size} bytes (max {max})")
            }
            Self::Storage { detail } => write!(f, "storage failure: {detail}"),
        }
    }
}

impl Error for DomainError {}

impl From<AuthServiceError> for DomainError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::EmptyCredentials => Self::EmptyCredentials,
            AuthServiceError::UserNotFound(user_name) => Self::UserNotFound { user_name },
            AuthServiceError::WrongPassword => Self::WrongPassword,
            AuthServiceError::DuplicateUser(user_name) => Self::DuplicateUser { user_name },
            other @ (AuthServiceError::CorruptCredential(_) | AuthServiceError::Repo(_)) => {
                Self::Storage {
                    detail: other.to_string(),
                }
            }
        }
    }
}

impl From<NoteServiceError> for DomainError {
    fn from(value: NoteServiceError) -> Self {
        match value {
            NoteServiceError::DuplicateTitle(title) => Self::DuplicateTitle { title },
            NoteServiceError::NoteNotFound(id) => Self::NoteNotFound { id },
            NoteServiceError::Repo(err) => Self::Storage {
                detail: err.to_string(),
            },
        }
    }
}

/// Malformed or out-of-sequence input; always fatal.
#[derive(Debug)]
pub enum ProtocolError {
    Codec(CodecError),
    MessageTooLarge { size: usize, max: usize },
    /// Handshake expected AUTH or REGISTER.
    UnexpectedHandshakeMessage { code: i64 },
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec(err) => write!(f, "{err}"),
            Self::MessageTooLarge { size, max } => {
                write!(f, "message too large: {size} bytes (max {max})")
            }
            Self::UnexpectedHandshakeMessage { code } => {
                write!(f, "message type {code} is not AUTH or REGISTER")
            }
        }
    }
}

impl Error for ProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for ProtocolError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Connection-level failure; the peer is not notified.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    /// Outer envelope could not be decoded after authentication.
    UndecodableEnvelope(CodecError),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::UndecodableEnvelope(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::UndecodableEnvelope(err) => Some(err),
        }
    }
}

/// Any failure that ends, or is answered within, a session.
#[derive(Debug)]
pub enum SessionError {
    Transport(TransportError),
    Protocol(ProtocolError),
    Domain(DomainError),
}

impl SessionError {
    /// Stable identifier for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::Io(_)) => "transport_io",
            Self::Transport(TransportError::UndecodableEnvelope(_)) => "undecodable_envelope",
            Self::Protocol(ProtocolError::Codec(_)) => "malformed_message",
            Self::Protocol(ProtocolError::MessageTooLarge { .. }) => "message_too_large",
            Self::Protocol(ProtocolError::UnexpectedHandshakeMessage { .. }) => {
                "unexpected_handshake_message"
            }
            Self::Domain(err) => err.code(),
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Domain(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Domain(err) => Some(err),
        }
    }
}

impl From<FrameError> for SessionError {
    fn from(value: FrameError) -> Self {
        match value {
            FrameError::Io(err) => Self::Transport(TransportError::Io(err)),
            FrameError::MessageTooLarge { size, max } => {
                Self::Protocol(ProtocolError::MessageTooLarge { size, max })
            }
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

impl From<DomainError> for SessionError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl From<AuthServiceError> for SessionError {
    fn from(value: AuthServiceError) -> Self {
        Self::Domain(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, SessionError};
    use crate::protocol::FrameError;
    use crate::service::note_service::NoteServiceError;

    #[test]
    fn note_service_errors_map_to_domain_kinds() {
        assert_eq!(
            DomainError::from(NoteServiceError::NoteNotFound(4)),
            DomainError::NoteNotFound { id: 4 }
        );
        assert_eq!(
            DomainError::from(NoteServiceError::DuplicateTitle("t".to_string())),
            DomainError::DuplicateTitle {
                title: "t".to_string()
            }
        );
    }

    #[test]
    fn unknown_code_wire_text_names_the_code() {
        let err = DomainError::UnknownMessageCode { code: 10 };
        assert_eq!(err.to_string(), "unknown server message code: 10");
        assert_eq!(err.code(), "unknown_message_code");
    }

    #[test]
    fn oversized_frames_are_protocol_errors() {
        let err = SessionError::from(FrameError::MessageTooLarge {
            size: 10,
            max: 5,
        });
        assert_eq!(err.code(), "message_too_large");
        assert!(err.to_string().contains("message too large"));
    }

    #[test]
    fn oversized_response_is_a_domain_error() {
        let err = DomainError::ResponseTooLarge {
            size: 5000,
            max: 4096,
        };
        assert_eq!(err.code(), "response_too_large");
        assert_eq!(err.to_string(), "response too large: 5000 bytes (max 4096)");
    }
}
