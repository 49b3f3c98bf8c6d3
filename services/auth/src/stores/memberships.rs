//! User to role assignments
//!
//! This store is the only writer of `user_role` rows. Role and user deletion
//! reach the cascade helpers below from inside their own session.

use std::sync::Arc;

use tracing::info;

use crate::error::{AuthError, AuthResult, StorageError, StorageResult};
use crate::models::{Membership, NewMembership, Role, User};
use crate::repositories::{Repository, Session, Storage};

/// Owner of the `user_role` rows
pub struct MembershipStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for MembershipStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> MembershipStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Give `role` to `user`
    ///
    /// The unique `(user_id, role_id)` constraint decides concurrent grants;
    /// the loser gets `UserAlreadyInRole`.
    pub async fn grant(&self, user: &User, role: &Role) -> AuthResult<Membership> {
        let mut session = self.storage.begin().await?;
        let new = NewMembership {
            user_id: user.id,
            role_id: role.id,
        };

        let membership = Repository::<Membership>::insert(&mut session, new)
            .await
            .map_err(grant_error)?;
        session.commit().await.map_err(grant_error)?;

        info!(user_id = user.id, role_id = role.id, "Role granted");
        Ok(membership)
    }

    pub async fn revoke(&self, user: &User, role: &Role) -> AuthResult<()> {
        let mut session = self.storage.begin().await?;
        let membership = session
            .find_membership(user.id, role.id)
            .await?
            .ok_or(AuthError::MembershipNotFound)?;

        if !Repository::<Membership>::delete(&mut session, membership.id).await? {
            return Err(AuthError::MembershipNotFound);
        }
        session.commit().await?;

        info!(user_id = user.id, role_id = role.id, "Role revoked");
        Ok(())
    }

    /// Roles held by `user`; callers must not rely on the order
    pub async fn roles_of(&self, user: &User) -> AuthResult<Vec<Role>> {
        let mut session = self.storage.begin().await?;
        Ok(session.roles_of_user(user.id).await?)
    }

    /// Holders of `role`; callers must not rely on the order
    pub async fn users_of(&self, role: &Role) -> AuthResult<Vec<User>> {
        let mut session = self.storage.begin().await?;
        Ok(session.users_of_role(role.id).await?)
    }

    pub async fn has_role(&self, user: &User, role: &Role) -> AuthResult<bool> {
        let mut session = self.storage.begin().await?;
        Ok(session.find_membership(user.id, role.id).await?.is_some())
    }

    /// Revoke every membership of `role`; an empty role is `RoleAlreadyEmpty`
    pub async fn clear_role(&self, role: &Role) -> AuthResult<u64> {
        let mut session = self.storage.begin().await?;
        let cleared = clear_role_in(&mut session, role.id).await?;
        if cleared == 0 {
            return Err(AuthError::RoleAlreadyEmpty);
        }
        session.commit().await?;

        info!(role_id = role.id, cleared, "Role emptied");
        Ok(cleared)
    }

    /// Revoke every membership of `user`; a user without roles is `UserNotHasRole`
    pub async fn clear_user(&self, user: &User) -> AuthResult<u64> {
        let mut session = self.storage.begin().await?;
        let cleared = clear_user_in(&mut session, user.id).await?;
        if cleared == 0 {
            return Err(AuthError::UserNotHasRole);
        }
        session.commit().await?;

        info!(user_id = user.id, cleared, "User roles cleared");
        Ok(cleared)
    }
}

pub(crate) async fn clear_role_in<T: Session>(session: &mut T, role_id: i64) -> StorageResult<u64> {
    session.delete_memberships_of_role(role_id).await
}

pub(crate) async fn clear_user_in<T: Session>(session: &mut T, user_id: i64) -> StorageResult<u64> {
    session.delete_memberships_of_user(user_id).await
}

fn grant_error(err: StorageError) -> AuthError {
    match err {
        StorageError::UniqueViolation { .. } => AuthError::UserAlreadyInRole,
        StorageError::ForeignKeyViolation { ref constraint } if constraint.contains("user_id") => {
            AuthError::UserNotFound
        }
        StorageError::ForeignKeyViolation { .. } => AuthError::RoleNotFound,
        other => AuthError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::test_support::Fixture;

    #[tokio::test]
    async fn test_grant_twice_keeps_one_membership() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        let role = fx.role("admin").await;

        fx.memberships.grant(&user, &role).await.unwrap();
        let err = fx.memberships.grant(&user, &role).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyInRole));

        let roles = fx.memberships.roles_of(&user).await.unwrap();
        assert_eq!(roles, vec![role]);
    }

    #[tokio::test]
    async fn test_concurrent_grants_yield_one_row() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        let role = fx.role("admin").await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let memberships = fx.memberships.clone();
                let (user, role) = (user.clone(), role.clone());
                tokio::spawn(async move { memberships.grant(&user, &role).await })
            })
            .collect();

        let mut granted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => granted += 1,
                Err(AuthError::UserAlreadyInRole) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(fx.memberships.users_of(&role).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grant_for_deleted_role_is_role_not_found() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        let role = fx.role("admin").await;
        fx.roles.delete(&role).await.unwrap();

        let err = fx.memberships.grant(&user, &role).await.unwrap_err();
        assert!(matches!(err, AuthError::RoleNotFound));
    }

    #[tokio::test]
    async fn test_revoke() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        let role = fx.role("admin").await;

        let err = fx.memberships.revoke(&user, &role).await.unwrap_err();
        assert!(matches!(err, AuthError::MembershipNotFound));

        fx.memberships.grant(&user, &role).await.unwrap();
        assert!(fx.memberships.has_role(&user, &role).await.unwrap());

        fx.memberships.revoke(&user, &role).await.unwrap();
        assert!(!fx.memberships.has_role(&user, &role).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_user() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;

        let err = fx.memberships.clear_user(&user).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotHasRole));

        for name in ["admin", "user", "Writer"] {
            let role = fx.role(name).await;
            fx.memberships.grant(&user, &role).await.unwrap();
        }
        assert_eq!(fx.memberships.roles_of(&user).await.unwrap().len(), 3);

        assert_eq!(fx.memberships.clear_user(&user).await.unwrap(), 3);
        assert!(fx.memberships.roles_of(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_role() {
        let fx = Fixture::new();
        let role = fx.role("admin").await;

        let err = fx.memberships.clear_role(&role).await.unwrap_err();
        assert!(matches!(err, AuthError::RoleAlreadyEmpty));

        let vader = fx.user("Darth_Vader").await;
        let luke = fx.user("Luke_Skywalker").await;
        fx.memberships.grant(&vader, &role).await.unwrap();
        fx.memberships.grant(&luke, &role).await.unwrap();
        assert_eq!(fx.memberships.users_of(&role).await.unwrap().len(), 2);

        assert_eq!(fx.memberships.clear_role(&role).await.unwrap(), 2);
        assert!(fx.memberships.users_of(&role).await.unwrap().is_empty());
    }
}
