//! Role-based access decision

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccountStore, MembershipStore, RoleStore};
use crate::error::{AuthError, AuthResult};
use crate::repositories::Storage;

/// Identity of whoever makes a request, however the transport established it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: i64,
}

/// Answers "may this caller go through a guard requiring one of these roles"
pub struct Authorizer<S> {
    accounts: AccountStore<S>,
    roles: RoleStore<S>,
    memberships: MembershipStore<S>,
}

impl<S> Clone for Authorizer<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            roles: self.roles.clone(),
            memberships: self.memberships.clone(),
        }
    }
}

impl<S: Storage> Authorizer<S> {
    pub fn new(
        accounts: AccountStore<S>,
        roles: RoleStore<S>,
        memberships: MembershipStore<S>,
    ) -> Self {
        Self {
            accounts,
            roles,
            memberships,
        }
    }

    /// True when the caller holds any one of `required_roles`
    ///
    /// An unresolvable caller is denied. Role names that do not exist are
    /// skipped rather than reported. Only storage failures surface as errors.
    pub async fn allowed<R: AsRef<str>>(
        &self,
        caller: Caller,
        required_roles: &[R],
    ) -> AuthResult<bool> {
        let user = match self.accounts.by_id(caller.user_id).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound) => {
                debug!(user_id = caller.user_id, "Denied: caller does not resolve");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        for name in required_roles {
            let name = name.as_ref();
            let role = match self.roles.by_name(name).await {
                Ok(role) => role,
                Err(AuthError::RoleNotFound) => {
                    debug!(role = name, "Skipping unknown role");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if self.memberships.has_role(&user, &role).await? {
                return Ok(true);
            }
        }

        debug!(user_id = user.id, "Denied: no required role held");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::test_support::Fixture;

    #[tokio::test]
    async fn test_admin_scenario() {
        let fx = Fixture::new();
        let admin = fx.roles.create("admin", Some("Administrator")).await.unwrap();
        let alice = fx
            .accounts
            .create("alice", "alice@x.com", "Secret123", "Secret123")
            .await
            .unwrap();
        let caller = Caller { user_id: alice.id };

        fx.memberships.grant(&alice, &admin).await.unwrap();
        assert!(fx.authorizer.allowed(caller, &["admin"]).await.unwrap());
        assert!(!fx.authorizer.allowed(caller, &["superuser"]).await.unwrap());

        fx.memberships.revoke(&alice, &admin).await.unwrap();
        assert!(!fx.authorizer.allowed(caller, &["admin"]).await.unwrap());
    }

    #[tokio::test]
    async fn test_any_listed_role_is_enough() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        let writer = fx.role("writer").await;
        fx.role("admin").await;
        fx.memberships.grant(&user, &writer).await.unwrap();

        let caller = Caller { user_id: user.id };
        let required = ["missing", "admin", "writer"];
        assert!(fx.authorizer.allowed(caller, &required).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_without_roles_is_denied() {
        let fx = Fixture::new();
        let user = fx.user("Darth_Vader").await;
        fx.role("admin").await;

        let caller = Caller { user_id: user.id };
        assert!(!fx.authorizer.allowed(caller, &["admin"]).await.unwrap());
        assert!(!fx.authorizer.allowed::<&str>(caller, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_caller_fails_closed() {
        let fx = Fixture::new();
        let role = fx.role("admin").await;
        let user = fx.user("Darth_Vader").await;
        fx.memberships.grant(&user, &role).await.unwrap();

        let stranger = Caller {
            user_id: user.id + 100,
        };
        assert!(!fx.authorizer.allowed(stranger, &["admin"]).await.unwrap());
    }
}
