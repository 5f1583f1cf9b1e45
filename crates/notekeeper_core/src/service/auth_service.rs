//! Credential verification and account registration.
//!
//! # Responsibility
//! - Look up users and verify passwords for the AUTH handshake.
//! - Register new users with hashed passwords for the REGISTER handshake.
//!
//! # Invariants
//! - Empty user names or passwords are never registered.
//! - Password hashing runs outside the shared connection lock.

use crate::db::SharedConnection;
use crate::model::user::User;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::password::{MalformedHash, PasswordHasher};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for handshake use-cases.
#[derive(Debug)]
pub enum AuthServiceError {
    /// User name or password is empty.
    EmptyCredentials,
    /// No account with this name exists.
    UserNotFound(String),
    /// Account exists but the password does not match.
    WrongPassword,
    /// An account with this name already exists.
    DuplicateUser(String),
    /// Stored hash cannot be interpreted.
    CorruptCredential(MalformedHash),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for AuthServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCredentials => write!(f, "user name and password must not be empty"),
            Self::UserNotFound(name) => write!(f, "user \"{name}\" not found"),
            Self::WrongPassword => write!(f, "wrong password"),
            Self::DuplicateUser(name) => {
                write!(f, "user with \"{name}\" nickname has been registered")
            }
            Self::CorruptCredential(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CorruptCredential(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AuthServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateUser(name) => Self::DuplicateUser(name),
            other => Self::Repo(other),
        }
    }
}

/// Handshake-time account operations, safe for concurrent sessions.
pub trait CredentialVerifier: Send + Sync {
    /// Returns the user when `password` matches the stored credential.
    fn authenticate(&self, user_name: &str, password: &str) -> Result<User, AuthServiceError>;
    /// Creates a new account and returns it.
    fn register(&self, user_name: &str, password: &str) -> Result<User, AuthServiceError>;
}

/// Credential verifier backed by the shared SQLite connection.
pub struct SqliteCredentialVerifier {
    conn: SharedConnection,
    hasher: PasswordHasher,
}

impl SqliteCredentialVerifier {
    pub fn new(conn: SharedConnection) -> Self {
        Self::with_hasher(conn, PasswordHasher::default())
    }

    /// Uses a caller-provided hasher (lower iteration counts in tests).
    pub fn with_hasher(conn: SharedConnection, hasher: PasswordHasher) -> Self {
        Self { conn, hasher }
    }

    fn find_user(&self, user_name: &str) -> Result<Option<User>, AuthServiceError> {
        let mut conn = self.conn.lock();
        let repo = SqliteUserRepository::new(&mut conn);
        Ok(repo.find_by_name(user_name)?)
    }
}

impl CredentialVerifier for SqliteCredentialVerifier {
    fn authenticate(&self, user_name: &str, password: &str) -> Result<User, AuthServiceError> {
        let user = self
            .find_user(user_name)?
            .ok_or_else(|| AuthServiceError::UserNotFound(user_name.to_string()))?;

        let matches = self
            .hasher
            .verify(password, &user.password_hash)
            .map_err(AuthServiceError::CorruptCredential)?;
        if !matches {
            return Err(AuthServiceError::WrongPassword);
        }

        Ok(user)
    }

    fn register(&self, user_name: &str, password: &str) -> Result<User, AuthServiceError> {
        if user_name.is_empty() || password.is_empty() {
            return Err(AuthServiceError::EmptyCredentials);
        }
        if self.find_user(user_name)?.is_some() {
            return Err(AuthServiceError::DuplicateUser(user_name.to_string()));
        }

        let password_hash = self.hasher.hash(password);
        let id = {
            let mut conn = self.conn.lock();
            let mut repo = SqliteUserRepository::new(&mut conn);
            repo.create_user(user_name, &password_hash)?
        };

        Ok(User {
            id,
            user_name: user_name.to_string(),
            password_hash,
        })
    }
}
