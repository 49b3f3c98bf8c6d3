//! Identity and access-control service
//!
//! Users, roles and the assignments between them, with credential hashing,
//! input validation and a role-based authorization check. The stores in
//! [`stores`] run over any [`repositories::Storage`] backend; [`routes`]
//! exposes them over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use auth::repositories::MemoryStorage;
//! use auth::stores::{AccountStore, Authorizer, Caller, MembershipStore, RoleStore};
//!
//! # async fn example() -> Result<(), auth::error::AuthError> {
//! let storage = Arc::new(MemoryStorage::new());
//! let accounts = AccountStore::new(storage.clone());
//! let roles = RoleStore::new(storage.clone());
//! let memberships = MembershipStore::new(storage);
//!
//! let admin = roles.create("admin", Some("Administrator")).await?;
//! let alice = accounts.create("alice", "alice@x.com", "Secret123", "Secret123").await?;
//! memberships.grant(&alice, &admin).await?;
//!
//! let authorizer = Authorizer::new(accounts, roles, memberships);
//! assert!(authorizer.allowed(Caller { user_id: alice.id }, &["admin"]).await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod stores;
pub mod validation;

pub use state::AppState;

/// Schema migrations of the PostgreSQL backend
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
