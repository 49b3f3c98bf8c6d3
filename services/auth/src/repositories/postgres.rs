//! PostgreSQL storage backend
//!
//! Every session is one `sqlx` transaction. Constraint violations come back
//! from the server and are converted by `From<sqlx::Error> for StorageError`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction, postgres::PgRow};
use tracing::debug;

use super::{Repository, Session, Storage};
use crate::error::StorageResult;
use crate::models::{Entity, Membership, NewMembership, NewRole, NewUser, Role, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, active, created_at, \
                            last_login_at, current_login_at, login_count";
const ROLE_COLUMNS: &str = "id, name, description, active, created_at";
const MEMBERSHIP_COLUMNS: &str = "id, user_id, role_id, created_at";

/// Column list of an entity's table
trait PgEntity: Entity + for<'r> sqlx::FromRow<'r, PgRow> {
    const COLUMNS: &'static str;
}

impl PgEntity for User {
    const COLUMNS: &'static str = USER_COLUMNS;
}

impl PgEntity for Role {
    const COLUMNS: &'static str = ROLE_COLUMNS;
}

impl PgEntity for Membership {
    const COLUMNS: &'static str = MEMBERSHIP_COLUMNS;
}

/// Storage over a PostgreSQL pool
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    type Session = PgSession;

    async fn begin(&self) -> StorageResult<PgSession> {
        let tx = self.pool.begin().await?;
        Ok(PgSession { tx })
    }
}

/// One PostgreSQL transaction; rolled back on drop unless committed
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl PgSession {
    async fn fetch_by_id<E: PgEntity>(&mut self, id: i64, for_update: bool) -> StorageResult<Option<E>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1{}",
            E::COLUMNS,
            E::TABLE,
            if for_update { " FOR UPDATE" } else { "" }
        );

        let row = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn delete_by_id<E: PgEntity>(&mut self, id: i64) -> StorageResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", E::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Repository<User> for PgSession {
    async fn insert(&mut self, new: NewUser) -> StorageResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn update(&mut self, user: &User) -> StorageResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4, active = $5,
                last_login_at = $6, current_login_at = $7, login_count = $8
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.active)
            .bind(user.last_login_at)
            .bind(user.current_login_at)
            .bind(user.login_count)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn delete(&mut self, id: i64) -> StorageResult<bool> {
        self.delete_by_id::<User>(id).await
    }

    async fn get(&mut self, id: i64) -> StorageResult<Option<User>> {
        self.fetch_by_id(id, false).await
    }

    async fn lock(&mut self, id: i64) -> StorageResult<Option<User>> {
        self.fetch_by_id(id, true).await
    }
}

#[async_trait]
impl Repository<Role> for PgSession {
    async fn insert(&mut self, new: NewRole) -> StorageResult<Role> {
        let sql = format!(
            "INSERT INTO role (name, description) VALUES ($1, $2) RETURNING {}",
            ROLE_COLUMNS
        );

        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(&new.name)
            .bind(&new.description)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(role)
    }

    async fn update(&mut self, role: &Role) -> StorageResult<Role> {
        let sql = format!(
            "UPDATE role SET name = $2, description = $3, active = $4 WHERE id = $1 RETURNING {}",
            ROLE_COLUMNS
        );

        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(role.id)
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.active)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(role)
    }

    async fn delete(&mut self, id: i64) -> StorageResult<bool> {
        self.delete_by_id::<Role>(id).await
    }

    async fn get(&mut self, id: i64) -> StorageResult<Option<Role>> {
        self.fetch_by_id(id, false).await
    }

    async fn lock(&mut self, id: i64) -> StorageResult<Option<Role>> {
        self.fetch_by_id(id, true).await
    }
}

#[async_trait]
impl Repository<Membership> for PgSession {
    async fn insert(&mut self, new: NewMembership) -> StorageResult<Membership> {
        let sql = format!(
            "INSERT INTO user_role (user_id, role_id) VALUES ($1, $2) RETURNING {}",
            MEMBERSHIP_COLUMNS
        );

        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(new.user_id)
            .bind(new.role_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(membership)
    }

    async fn update(&mut self, membership: &Membership) -> StorageResult<Membership> {
        let sql = format!(
            "UPDATE user_role SET user_id = $2, role_id = $3 WHERE id = $1 RETURNING {}",
            MEMBERSHIP_COLUMNS
        );

        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(membership.id)
            .bind(membership.user_id)
            .bind(membership.role_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(membership)
    }

    async fn delete(&mut self, id: i64) -> StorageResult<bool> {
        self.delete_by_id::<Membership>(id).await
    }

    async fn get(&mut self, id: i64) -> StorageResult<Option<Membership>> {
        self.fetch_by_id(id, false).await
    }

    async fn lock(&mut self, id: i64) -> StorageResult<Option<Membership>> {
        self.fetch_by_id(id, true).await
    }
}

#[async_trait]
impl Session for PgSession {
    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn list_users(&mut self, limit: i64) -> StorageResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id DESC LIMIT $1",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(users)
    }

    async fn count_users(&mut self) -> StorageResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(total)
    }

    async fn find_role_by_name(&mut self, name: &str) -> StorageResult<Option<Role>> {
        let sql = format!("SELECT {} FROM role WHERE name = $1", ROLE_COLUMNS);
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(role)
    }

    async fn search_roles(&mut self, fragment: &str) -> StorageResult<Vec<Role>> {
        // strpos keeps the match literal, so `%` and `_` need no escaping
        let sql = format!(
            "SELECT {} FROM role WHERE strpos(name, $1) > 0 ORDER BY id",
            ROLE_COLUMNS
        );
        let roles = sqlx::query_as::<_, Role>(&sql)
            .bind(fragment)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(roles)
    }

    async fn list_roles(&mut self, limit: i64) -> StorageResult<Vec<Role>> {
        let sql = format!("SELECT {} FROM role ORDER BY id DESC LIMIT $1", ROLE_COLUMNS);
        let roles = sqlx::query_as::<_, Role>(&sql)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(roles)
    }

    async fn find_membership(
        &mut self,
        user_id: i64,
        role_id: i64,
    ) -> StorageResult<Option<Membership>> {
        let sql = format!(
            "SELECT {} FROM user_role WHERE user_id = $1 AND role_id = $2",
            MEMBERSHIP_COLUMNS
        );
        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(user_id)
            .bind(role_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(membership)
    }

    async fn roles_of_user(&mut self, user_id: i64) -> StorageResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description, r.active, r.created_at
            FROM role r
            JOIN user_role ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY ur.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(roles)
    }

    async fn users_of_role(&mut self, role_id: i64) -> StorageResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.active, u.created_at,
                   u.last_login_at, u.current_login_at, u.login_count
            FROM users u
            JOIN user_role ur ON ur.user_id = u.id
            WHERE ur.role_id = $1
            ORDER BY ur.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(users)
    }

    async fn delete_memberships_of_role(&mut self, role_id: i64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM user_role WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_memberships_of_user(&mut self, user_id: i64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM user_role WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> StorageResult<()> {
        self.tx.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }
}
