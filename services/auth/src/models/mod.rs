//! Identity models: users, roles and the memberships joining them

pub mod membership;
pub mod role;
pub mod user;

// Re-export for convenience
pub use membership::{Membership, NewMembership};
pub use role::{NewRole, Role, RoleChanges};
pub use user::{NewUser, Registration, User};

/// A persisted row type with a surrogate integer key
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    /// Payload accepted by an insert
    type New: Send + Sync + 'static;

    /// Table backing the entity
    const TABLE: &'static str;

    fn id(&self) -> i64;
}

/// Outcome of a write that may either insert or update a row
#[derive(Debug, Clone, PartialEq)]
pub enum Saved<T> {
    Created(T),
    Updated(T),
}

impl<T> Saved<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Saved::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Saved::Created(value) | Saved::Updated(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Saved::Created(value) | Saved::Updated(value) => value,
        }
    }
}
