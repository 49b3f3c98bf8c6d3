//! User to role assignment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Entity;

/// One grant of one role to one user; `(user_id, role_id)` is unique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Entity for Membership {
    type New = NewMembership;
    const TABLE: &'static str = "user_role";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMembership {
    pub user_id: i64,
    pub role_id: i64,
}
