//! Role model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Entity;

/// Role entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Role {
    type New = NewRole;
    const TABLE: &'static str = "role";

    fn id(&self) -> i64 {
        self.id
    }
}

/// New role creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// Role update payload; `None` leaves the field unchanged
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}
