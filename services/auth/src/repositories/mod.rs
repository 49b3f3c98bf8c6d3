//! Persistence collaborator for the identity core
//!
//! The core only talks to storage through these traits. A [`Storage`] opens
//! [`Session`]s; a session is one atomic unit of work that is rolled back
//! unless [`Session::commit`] is called. Unique constraints are enforced by
//! the backend and reported as [`StorageError::UniqueViolation`].
//!
//! [`StorageError::UniqueViolation`]: crate::error::StorageError::UniqueViolation

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{Entity, Membership, Role, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Unique constraint names shared by every backend
pub mod constraints {
    pub const USERNAME: &str = "users_username_key";
    pub const EMAIL: &str = "users_email_key";
    pub const ROLE_NAME: &str = "role_name_key";
    pub const MEMBERSHIP: &str = "un_user_role";
}

/// Generic row access, implemented per entity type
#[async_trait]
pub trait Repository<E: Entity>: Send {
    async fn insert(&mut self, new: E::New) -> StorageResult<E>;

    /// Persist every mutable column of `entity` and return the stored row
    async fn update(&mut self, entity: &E) -> StorageResult<E>;

    /// Returns `false` when no row had that id
    async fn delete(&mut self, id: i64) -> StorageResult<bool>;

    async fn get(&mut self, id: i64) -> StorageResult<Option<E>>;

    /// Like `get`, but the row stays locked until the session ends
    async fn lock(&mut self, id: i64) -> StorageResult<Option<E>>;
}

/// One transaction against the store
#[async_trait]
pub trait Session: Repository<User> + Repository<Role> + Repository<Membership> + Send {
    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>>;

    /// Users, newest first
    async fn list_users(&mut self, limit: i64) -> StorageResult<Vec<User>>;

    async fn count_users(&mut self) -> StorageResult<i64>;

    /// Case-sensitive exact match
    async fn find_role_by_name(&mut self, name: &str) -> StorageResult<Option<Role>>;

    /// Case-sensitive containment match
    async fn search_roles(&mut self, fragment: &str) -> StorageResult<Vec<Role>>;

    /// Roles, newest first
    async fn list_roles(&mut self, limit: i64) -> StorageResult<Vec<Role>>;

    async fn find_membership(
        &mut self,
        user_id: i64,
        role_id: i64,
    ) -> StorageResult<Option<Membership>>;

    /// Roles held by a user, in grant order
    async fn roles_of_user(&mut self, user_id: i64) -> StorageResult<Vec<Role>>;

    /// Holders of a role, in grant order
    async fn users_of_role(&mut self, role_id: i64) -> StorageResult<Vec<User>>;

    /// Returns the number of memberships removed
    async fn delete_memberships_of_role(&mut self, role_id: i64) -> StorageResult<u64>;

    /// Returns the number of memberships removed
    async fn delete_memberships_of_user(&mut self, user_id: i64) -> StorageResult<u64>;

    async fn commit(self) -> StorageResult<()>;
}

/// Entry point of a persistence backend
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    type Session: Session;

    async fn begin(&self) -> StorageResult<Self::Session>;
}
