//! Core use-case services consumed by server sessions.
//!
//! # Responsibility
//! - Expose the Note Store and Credential Verifier as thread-safe seams.
//! - Orchestrate repository calls on the shared connection.
//! - Keep the session/protocol layer decoupled from storage details.

pub mod auth_service;
pub mod note_service;
pub mod password;
