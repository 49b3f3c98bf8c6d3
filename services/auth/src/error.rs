//! Error types for the account, role and membership core
//!
//! `AuthError` carries one stable kind per client-input or state-conflict
//! condition. Anything the core cannot recover from travels inside
//! `AuthError::Storage`.

use thiserror::Error;

use crate::credentials::HashError;

/// Failure reported by a persistence backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// A unique constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A foreign key constraint rejected the write
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// Any other database failure (connectivity, schema mismatch, ...)
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Failure internal to a non-SQL backend
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StorageError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StorageError::ForeignKeyViolation { constraint };
            }
        }
        StorageError::Database(err)
    }
}

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Domain error taxonomy of the core
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid email")]
    InvalidEmail,

    #[error("password does not meet the strength requirements")]
    InvalidPassword,

    #[error("role name must be 3 to 80 characters long")]
    InvalidRoleName,

    #[error("role description must be at most 255 characters long")]
    InvalidDescription,

    #[error("password and confirmation do not match")]
    PasswordMismatch,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("role not found")]
    RoleNotFound,

    #[error("role already exists")]
    RoleAlreadyExists,

    #[error("role has no members")]
    RoleAlreadyEmpty,

    #[error("user has no roles")]
    UserNotHasRole,

    #[error("user already holds this role")]
    UserAlreadyInRole,

    #[error("membership not found")]
    MembershipNotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

impl AuthError {
    /// True for the kinds raised by input validation, before any write
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidUsername
                | AuthError::InvalidEmail
                | AuthError::InvalidPassword
                | AuthError::InvalidRoleName
                | AuthError::InvalidDescription
                | AuthError::PasswordMismatch
        )
    }

    /// Translate a unique violation into `conflict`, pass anything else through
    pub(crate) fn on_conflict(err: StorageError, conflict: AuthError) -> AuthError {
        if err.is_unique_violation() {
            conflict
        } else {
            AuthError::Storage(err)
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
