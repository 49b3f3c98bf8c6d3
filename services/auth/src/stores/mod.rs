//! Account, role and membership stores plus the authorization check
//!
//! Each mutating operation runs in exactly one storage session. Validation
//! happens before the session writes anything, and unique violations raised
//! by the backend are translated into the matching [`AuthError`] kind.
//!
//! [`AuthError`]: crate::error::AuthError

pub mod accounts;
pub mod authorization;
pub mod memberships;
pub mod roles;

pub use accounts::AccountStore;
pub use authorization::{Authorizer, Caller};
pub use memberships::MembershipStore;
pub use roles::{NameMatch, RoleStore};

/// Default page size of the listing operations
pub const DEFAULT_LIST_LIMIT: i64 = 100;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Role, User};
    use crate::repositories::MemoryStorage;

    pub struct Fixture {
        pub accounts: AccountStore<MemoryStorage>,
        pub roles: RoleStore<MemoryStorage>,
        pub memberships: MembershipStore<MemoryStorage>,
        pub authorizer: Authorizer<MemoryStorage>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let storage = Arc::new(MemoryStorage::new());
            let accounts = AccountStore::new(storage.clone());
            let roles = RoleStore::new(storage.clone());
            let memberships = MembershipStore::new(storage);
            let authorizer = Authorizer::new(accounts.clone(), roles.clone(), memberships.clone());
            Self {
                accounts,
                roles,
                memberships,
                authorizer,
            }
        }

        pub async fn user(&self, username: &str) -> User {
            self.accounts
                .create(
                    username,
                    &format!("{}@bewith.you", username.to_lowercase()),
                    "12345678",
                    "12345678",
                )
                .await
                .unwrap()
        }

        pub async fn role(&self, name: &str) -> Role {
            self.roles.create(name, Some(name)).await.unwrap()
        }
    }
}
