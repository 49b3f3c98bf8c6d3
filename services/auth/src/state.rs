//! Application state shared across handlers

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::repositories::Storage;
use crate::stores::{AccountStore, Authorizer, MembershipStore, RoleStore};

pub struct AppState<S> {
    pub accounts: AccountStore<S>,
    pub roles: RoleStore<S>,
    pub memberships: MembershipStore<S>,
    pub authorizer: Authorizer<S>,
    pub jwt_service: JwtService,
    /// Roles any one of which opens the `/admin` routes
    pub admin_roles: Arc<[String]>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            roles: self.roles.clone(),
            memberships: self.memberships.clone(),
            authorizer: self.authorizer.clone(),
            jwt_service: self.jwt_service.clone(),
            admin_roles: Arc::clone(&self.admin_roles),
        }
    }
}

impl<S: Storage> AppState<S> {
    pub fn new(storage: Arc<S>, jwt_service: JwtService, admin_roles: Vec<String>) -> Self {
        let accounts = AccountStore::new(Arc::clone(&storage));
        let roles = RoleStore::new(Arc::clone(&storage));
        let memberships = MembershipStore::new(storage);
        let authorizer = Authorizer::new(accounts.clone(), roles.clone(), memberships.clone());

        Self {
            accounts,
            roles,
            memberships,
            authorizer,
            jwt_service,
            admin_roles: admin_roles.into(),
        }
    }

    /// Start-up provisioning of the admin roles and their first holder
    ///
    /// With `create_roles` every admin role is ensured. The user behind
    /// `admin_login` then receives each admin role that exists; roles it
    /// already holds are left alone. An unknown login is logged and skipped.
    pub async fn bootstrap_admin(
        &self,
        create_roles: bool,
        admin_login: Option<&str>,
    ) -> AuthResult<()> {
        if create_roles {
            for name in self.admin_roles.iter() {
                let saved = self.roles.ensure(name, Some("Administrator")).await?;
                if saved.is_created() {
                    info!(role = %name, "Admin role created");
                }
            }
        }

        let Some(login) = admin_login else {
            return Ok(());
        };
        let user = match self.accounts.by_login(login).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound) => {
                warn!(login, "Bootstrap admin user not found, no admin role granted");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for name in self.admin_roles.iter() {
            let role = match self.roles.by_name(name).await {
                Ok(role) => role,
                Err(AuthError::RoleNotFound) => {
                    warn!(role = %name, "Admin role missing, not granted");
                    continue;
                }
                Err(err) => return Err(err),
            };
            match self.memberships.grant(&user, &role).await {
                Ok(_) => info!(user_id = user.id, role = %name, "Admin role granted"),
                Err(AuthError::UserAlreadyInRole) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
