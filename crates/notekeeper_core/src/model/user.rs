//! User domain model.
//!
//! # Invariants
//! - `user_name` is unique across the store.
//! - `password_hash` is an encoded salted hash, never plain text.

use crate::model::note::UserId;

/// Registered account as seen by the server core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub user_name: String,
    pub password_hash: String,
}
