//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Entity;

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub current_login_at: Option<DateTime<Utc>>,
    pub login_count: i32,
}

impl Entity for User {
    type New = NewUser;
    const TABLE: &'static str = "users";

    fn id(&self) -> i64 {
        self.id
    }
}

/// New user creation payload
///
/// `password_hash` must come out of the credential codec.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Result of a self-service sign-up
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    /// Plaintext of a password generated on the caller's behalf, shown once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}
