//! Domain model for users and their notes.
//!
//! # Responsibility
//! - Define canonical data structures shared by storage, services and the
//!   wire protocol.
//!
//! # Invariants
//! - Every note belongs to exactly one user (`Note::user_id`).
//! - A note title is unique per owner at creation time.

pub mod note;
pub mod user;
