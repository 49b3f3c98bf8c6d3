//! In-memory storage backend
//!
//! Intended for tests and local runs without PostgreSQL. A session holds the
//! dataset lock for its whole life and works on a private copy which
//! `commit` publishes, so sessions are serialisable and a dropped session
//! leaves no trace. Unique and foreign key constraints mirror the SQL schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Repository, Session, Storage, constraints};
use crate::error::{StorageError, StorageResult};
use crate::models::{Entity, Membership, NewMembership, NewRole, NewUser, Role, User};

/// Row behaviour the generic [`Table`] relies on
pub trait MemoryRow: Entity {
    fn materialize(id: i64, new: Self::New, now: DateTime<Utc>) -> Self;

    /// `(constraint, value)` pairs that must be unique across the table
    fn unique_keys(&self) -> Vec<(&'static str, String)>;

    /// Copy the mutable columns of `changes` onto `self`
    fn apply(&mut self, changes: &Self);

    /// Reject rows pointing at missing parents
    fn check_references(&self, _tables: &Tables) -> StorageResult<()> {
        Ok(())
    }

    /// Reject deleting a row that other rows still point at
    fn check_referrers(_id: i64, _tables: &Tables) -> StorageResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Table<E> {
    rows: BTreeMap<i64, E>,
    next_id: i64,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<E: MemoryRow> Table<E> {
    fn conflict(&self, candidate: &E) -> Option<&'static str> {
        let wanted = candidate.unique_keys();
        self.rows
            .values()
            .filter(|row| row.id() != candidate.id())
            .find_map(|row| {
                row.unique_keys()
                    .into_iter()
                    .zip(wanted.iter())
                    .find(|(existing, wanted)| existing == *wanted)
                    .map(|(existing, _)| existing.0)
            })
    }

    fn insert_row(&mut self, row: E) -> StorageResult<E> {
        if let Some(constraint) = self.conflict(&row) {
            return Err(StorageError::UniqueViolation {
                constraint: constraint.to_string(),
            });
        }

        self.next_id += 1;
        self.rows.insert(row.id(), row.clone());
        Ok(row)
    }

    fn update(&mut self, changes: &E) -> StorageResult<E> {
        let mut row = self
            .rows
            .get(&changes.id())
            .cloned()
            .ok_or_else(|| StorageError::Backend(format!("{} row {} not found", E::TABLE, changes.id())))?;
        row.apply(changes);

        if let Some(constraint) = self.conflict(&row) {
            return Err(StorageError::UniqueViolation {
                constraint: constraint.to_string(),
            });
        }

        self.rows.insert(row.id(), row.clone());
        Ok(row)
    }

    fn values(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    /// Rows with the highest ids first
    fn newest(&self, limit: i64) -> Vec<E> {
        let limit = usize::try_from(limit).unwrap_or(0);
        self.rows.values().rev().take(limit).cloned().collect()
    }
}

/// Complete dataset of the in-memory backend
#[derive(Debug, Clone, Default)]
pub struct Tables {
    users: Table<User>,
    roles: Table<Role>,
    memberships: Table<Membership>,
}

/// Gives generic code access to the table of one entity type
pub trait HasTable<E> {
    fn table(&self) -> &Table<E>;
    fn table_mut(&mut self) -> &mut Table<E>;
}

macro_rules! has_table {
    ($entity:ty, $field:ident) => {
        impl HasTable<$entity> for Tables {
            fn table(&self) -> &Table<$entity> {
                &self.$field
            }

            fn table_mut(&mut self) -> &mut Table<$entity> {
                &mut self.$field
            }
        }
    };
}

has_table!(User, users);
has_table!(Role, roles);
has_table!(Membership, memberships);

impl MemoryRow for User {
    fn materialize(id: i64, new: NewUser, now: DateTime<Utc>) -> Self {
        User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            active: true,
            created_at: now,
            last_login_at: None,
            current_login_at: None,
            login_count: 0,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            (constraints::USERNAME, self.username.clone()),
            (constraints::EMAIL, self.email.clone()),
        ]
    }

    fn apply(&mut self, changes: &Self) {
        self.username = changes.username.clone();
        self.email = changes.email.clone();
        self.password_hash = changes.password_hash.clone();
        self.active = changes.active;
        self.last_login_at = changes.last_login_at;
        self.current_login_at = changes.current_login_at;
        self.login_count = changes.login_count;
    }

    fn check_referrers(id: i64, tables: &Tables) -> StorageResult<()> {
        if tables.memberships.values().any(|m| m.user_id == id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "user_role_user_id_fkey".to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryRow for Role {
    fn materialize(id: i64, new: NewRole, now: DateTime<Utc>) -> Self {
        Role {
            id,
            name: new.name,
            description: new.description,
            active: true,
            created_at: now,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(constraints::ROLE_NAME, self.name.clone())]
    }

    fn apply(&mut self, changes: &Self) {
        self.name = changes.name.clone();
        self.description = changes.description.clone();
        self.active = changes.active;
    }

    fn check_referrers(id: i64, tables: &Tables) -> StorageResult<()> {
        if tables.memberships.values().any(|m| m.role_id == id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "user_role_role_id_fkey".to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryRow for Membership {
    fn materialize(id: i64, new: NewMembership, now: DateTime<Utc>) -> Self {
        Membership {
            id,
            user_id: new.user_id,
            role_id: new.role_id,
            created_at: now,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            constraints::MEMBERSHIP,
            format!("{}:{}", self.user_id, self.role_id),
        )]
    }

    fn apply(&mut self, changes: &Self) {
        self.user_id = changes.user_id;
        self.role_id = changes.role_id;
    }

    fn check_references(&self, tables: &Tables) -> StorageResult<()> {
        if !tables.users.rows.contains_key(&self.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "user_role_user_id_fkey".to_string(),
            });
        }
        if !tables.roles.rows.contains_key(&self.role_id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: "user_role_role_id_fkey".to_string(),
            });
        }
        Ok(())
    }
}

/// Process-local storage shared by every clone
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Session = MemorySession;

    async fn begin(&self) -> StorageResult<MemorySession> {
        let guard = self.state.clone().lock_owned().await;
        Ok(MemorySession {
            guard,
            working: None,
        })
    }
}

/// A serialised unit of work over [`MemoryStorage`]
///
/// Reads go straight to the locked dataset; the first write takes a private
/// copy, which `commit` publishes and dropping the session discards.
pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Option<Tables>,
}

impl MemorySession {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        self.working.get_or_insert_with(|| Tables::clone(&self.guard))
    }
}

#[async_trait]
impl<E> Repository<E> for MemorySession
where
    E: MemoryRow,
    Tables: HasTable<E>,
{
    async fn insert(&mut self, new: E::New) -> StorageResult<E> {
        let next_id = HasTable::<E>::table(self.tables()).next_id;
        let row = E::materialize(next_id, new, Utc::now());
        row.check_references(self.tables())?;
        HasTable::<E>::table_mut(self.tables_mut()).insert_row(row)
    }

    async fn update(&mut self, entity: &E) -> StorageResult<E> {
        entity.check_references(self.tables())?;
        HasTable::<E>::table_mut(self.tables_mut()).update(entity)
    }

    async fn delete(&mut self, id: i64) -> StorageResult<bool> {
        if !HasTable::<E>::table(self.tables()).rows.contains_key(&id) {
            return Ok(false);
        }
        E::check_referrers(id, self.tables())?;
        Ok(HasTable::<E>::table_mut(self.tables_mut())
            .rows
            .remove(&id)
            .is_some())
    }

    async fn get(&mut self, id: i64) -> StorageResult<Option<E>> {
        Ok(HasTable::<E>::table(self.tables()).rows.get(&id).cloned())
    }

    async fn lock(&mut self, id: i64) -> StorageResult<Option<E>> {
        // the whole dataset is already held by this session
        Repository::<E>::get(self, id).await
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&mut self, limit: i64) -> StorageResult<Vec<User>> {
        Ok(self.tables().users.newest(limit))
    }

    async fn count_users(&mut self) -> StorageResult<i64> {
        Ok(self.tables().users.rows.len() as i64)
    }

    async fn find_role_by_name(&mut self, name: &str) -> StorageResult<Option<Role>> {
        Ok(self
            .tables()
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn search_roles(&mut self, fragment: &str) -> StorageResult<Vec<Role>> {
        Ok(self
            .tables()
            .roles
            .values()
            .filter(|r| r.name.contains(fragment))
            .cloned()
            .collect())
    }

    async fn list_roles(&mut self, limit: i64) -> StorageResult<Vec<Role>> {
        Ok(self.tables().roles.newest(limit))
    }

    async fn find_membership(
        &mut self,
        user_id: i64,
        role_id: i64,
    ) -> StorageResult<Option<Membership>> {
        Ok(self
            .tables()
            .memberships
            .values()
            .find(|m| m.user_id == user_id && m.role_id == role_id)
            .cloned())
    }

    async fn roles_of_user(&mut self, user_id: i64) -> StorageResult<Vec<Role>> {
        let tables = self.tables();
        Ok(tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.roles.rows.get(&m.role_id).cloned())
            .collect())
    }

    async fn users_of_role(&mut self, role_id: i64) -> StorageResult<Vec<User>> {
        let tables = self.tables();
        Ok(tables
            .memberships
            .values()
            .filter(|m| m.role_id == role_id)
            .filter_map(|m| tables.users.rows.get(&m.user_id).cloned())
            .collect())
    }

    async fn delete_memberships_of_role(&mut self, role_id: i64) -> StorageResult<u64> {
        let rows = &mut self.tables_mut().memberships.rows;
        let before = rows.len();
        rows.retain(|_, m| m.role_id != role_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_memberships_of_user(&mut self, user_id: i64) -> StorageResult<u64> {
        let rows = &mut self.tables_mut().memberships.rows;
        let before = rows.len();
        rows.retain(|_, m| m.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn commit(self) -> StorageResult<()> {
        let MemorySession { mut guard, working } = self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_role(name: &str) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_session_is_rolled_back() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        let role = Repository::<Role>::insert(&mut session, new_role("admin")).await.unwrap();
        drop(session);

        let mut session = storage.begin().await.unwrap();
        let found = Repository::<Role>::get(&mut session, role.id).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_reads_do_not_copy_the_dataset() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        Repository::<Role>::insert(&mut session, new_role("admin")).await.unwrap();
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        assert!(session.find_role_by_name("admin").await.unwrap().is_some());
        assert_eq!(session.list_roles(10).await.unwrap().len(), 1);
        assert!(session.working.is_none());
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        Repository::<Role>::insert(&mut session, new_role("reader")).await.unwrap();
        assert!(session.working.is_some());
        assert_eq!(session.guard.roles.rows.len(), 1);
        assert_eq!(session.list_roles(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_committed_session_is_visible() {
        let storage = MemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        let user = Repository::<User>::insert(&mut session, new_user("alice", "alice@x.com")).await.unwrap();
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        let found = session.find_user_by_email("alice@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_unique_keys_are_enforced_per_constraint() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let _ = Repository::<User>::insert(&mut session, new_user("alice", "alice@x.com")).await.unwrap();

        let err = Repository::<User>::insert(&mut session, new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::UniqueViolation { ref constraint } if constraint == constraints::USERNAME)
        );

        let err = Repository::<User>::insert(&mut session, new_user("bob", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::UniqueViolation { ref constraint } if constraint == constraints::EMAIL)
        );
    }

    #[tokio::test]
    async fn test_update_checks_uniqueness_against_other_rows() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let _ = Repository::<Role>::insert(&mut session, new_role("admin")).await.unwrap();
        let mut writer = Repository::<Role>::insert(&mut session, new_role("writer")).await.unwrap();

        writer.description = Some("Writer".to_string());
        let saved = Repository::<Role>::update(&mut session, &writer).await.unwrap();
        assert_eq!(saved.description.as_deref(), Some("Writer"));

        writer.name = "admin".to_string();
        let err = Repository::<Role>::update(&mut session, &writer)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_membership_requires_existing_parents() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();

        let err = Repository::<Membership>::insert(
            &mut session,
            NewMembership {
                user_id: 1,
                role_id: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_role_with_members_cannot_be_deleted_directly() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        let user = Repository::<User>::insert(&mut session, new_user("alice", "alice@x.com")).await.unwrap();
        let role = Repository::<Role>::insert(&mut session, new_role("admin")).await.unwrap();
        let membership = NewMembership {
            user_id: user.id,
            role_id: role.id,
        };
        Repository::<Membership>::insert(&mut session, membership)
            .await
            .unwrap();

        let err = Repository::<Role>::delete(&mut session, role.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));

        assert_eq!(session.delete_memberships_of_role(role.id).await.unwrap(), 1);
        assert!(Repository::<Role>::delete(&mut session, role.id).await.unwrap());
        assert!(!Repository::<Role>::delete(&mut session, role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_is_newest_first() {
        let storage = MemoryStorage::new();
        let mut session = storage.begin().await.unwrap();
        for name in ["first", "second", "third"] {
            let _ = Repository::<Role>::insert(&mut session, new_role(name)).await.unwrap();
        }

        let names: Vec<String> = session
            .list_roles(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["third", "second"]);
    }
}
