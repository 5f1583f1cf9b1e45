//! Core of the notekeeper note server.
//!
//! Owns persistence, the wire protocol, session handling and the admission
//! gate. The `notekeeper` binary is a thin shell over [`server::Server`].

pub mod client;
pub mod db;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod repo;
pub mod server;
pub mod service;

pub use client::{ClientError, ClientResult, NoteClient};
pub use db::{open_db, open_db_in_memory, share, DbError, SharedConnection};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::note::{Note, NoteId, NoteList, UserId};
pub use model::user::User;
pub use protocol::{Envelope, MessageType};
pub use server::admission::{AdmissionController, AdmissionSlot};
pub use server::config::{load_config, ConfigError, ServerConfig};
pub use server::error::{DomainError, ProtocolError, SessionError, TransportError};
pub use server::session::{EndReason, SessionReport};
pub use server::{Server, Services};
pub use service::auth_service::{AuthServiceError, CredentialVerifier, SqliteCredentialVerifier};
pub use service::note_service::{NoteServiceError, NoteStore, SqliteNoteStore};
pub use service::password::PasswordHasher;

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
