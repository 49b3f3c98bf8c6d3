//! User accounts: registration, lookup, credentials and activation

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::memberships;
use crate::credentials::{hash_password, verify_password};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, Registration, User};
use crate::repositories::{Repository, Session, Storage};
use crate::validation::{valid_email, valid_password, valid_username};

/// Owner of the `users` rows
pub struct AccountStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for AccountStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> AccountStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Create an active user
    ///
    /// Checks run in order and stop at the first failure: username, email,
    /// password strength, confirmation.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> AuthResult<User> {
        check_identity(username, email)?;
        if !valid_password(password) {
            return Err(AuthError::InvalidPassword);
        }
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let hashed = hash_password(password)?;
        self.insert(username, email, hashed.hash).await
    }

    /// Self-service sign-up
    ///
    /// Without a password one is generated and handed back exactly once in
    /// [`Registration::generated_password`].
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: Option<&str>,
    ) -> AuthResult<Registration> {
        match password.filter(|p| !p.is_empty()) {
            Some(password) => {
                let user = self.create(username, email, password, password).await?;
                Ok(Registration {
                    user,
                    generated_password: None,
                })
            }
            None => {
                check_identity(username, email)?;
                let hashed = hash_password("")?;
                let user = self.insert(username, email, hashed.hash).await?;
                Ok(Registration {
                    user,
                    generated_password: hashed.generated,
                })
            }
        }
    }

    async fn insert(&self, username: &str, email: &str, password_hash: String) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        let user = Repository::<User>::insert(&mut session, new_user)
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::UserAlreadyExists))?;
        session
            .commit()
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::UserAlreadyExists))?;

        info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Resolve a user from an email or, failing the email shape, a username
    pub async fn by_login(&self, login: &str) -> AuthResult<User> {
        if valid_email(login) {
            self.by_email(login).await
        } else {
            self.by_username(login).await
        }
    }

    pub async fn by_username(&self, username: &str) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        session
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn by_email(&self, email: &str) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        session
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn by_id(&self, id: i64) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        Repository::<User>::get(&mut session, id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Newest users first
    pub async fn list(&self, limit: i64) -> AuthResult<Vec<User>> {
        let mut session = self.storage.begin().await?;
        Ok(session.list_users(limit).await?)
    }

    pub async fn count(&self) -> AuthResult<i64> {
        let mut session = self.storage.begin().await?;
        Ok(session.count_users().await?)
    }

    pub fn validate_password(&self, user: &User, plaintext: &str) -> bool {
        verify_password(&user.password_hash, plaintext)
    }

    /// Check a login/password pair and record the login
    ///
    /// An inactive account answers like a wrong password.
    pub async fn authenticate(&self, login: &str, password: &str) -> AuthResult<User> {
        let user = self.by_login(login).await?;
        if !self.validate_password(&user, password) {
            warn!(user_id = user.id, "Rejected login: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.active {
            warn!(user_id = user.id, "Rejected login: account inactive");
            return Err(AuthError::InvalidCredentials);
        }

        self.record_login(&user).await
    }

    /// Shift the login timestamps and bump the counter
    pub async fn record_login(&self, user: &User) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        let mut current = Repository::<User>::lock(&mut session, user.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        current.last_login_at = current.current_login_at;
        current.current_login_at = Some(Utc::now());
        current.login_count += 1;

        let updated = Repository::<User>::update(&mut session, &current).await?;
        session.commit().await?;

        info!(user_id = updated.id, login_count = updated.login_count, "Login recorded");
        Ok(updated)
    }

    /// Replace the password after proving knowledge of the current one
    ///
    /// Hashing runs outside any session. The write is refused with
    /// `InvalidCredentials` if the stored hash moved in the meantime.
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        confirm_new_password: &str,
    ) -> AuthResult<()> {
        let current = self.by_id(user.id).await?;

        if !verify_password(&current.password_hash, old_password) {
            warn!(user_id = current.id, "Password change rejected: wrong current password");
            return Err(AuthError::InvalidCredentials);
        }
        if !valid_password(new_password) {
            return Err(AuthError::InvalidPassword);
        }
        if new_password != confirm_new_password {
            return Err(AuthError::PasswordMismatch);
        }
        let new_hash = hash_password(new_password)?.hash;

        let mut session = self.storage.begin().await?;
        let mut locked = Repository::<User>::lock(&mut session, user.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if locked.password_hash != current.password_hash {
            warn!(user_id = locked.id, "Password change rejected: password changed concurrently");
            return Err(AuthError::InvalidCredentials);
        }

        locked.password_hash = new_hash;
        Repository::<User>::update(&mut session, &locked).await?;
        session.commit().await?;

        info!(user_id = locked.id, "Password changed");
        Ok(())
    }

    /// Flip the active flag and return the stored user
    pub async fn toggle_active(&self, user: &User) -> AuthResult<User> {
        let mut session = self.storage.begin().await?;
        let mut current = Repository::<User>::lock(&mut session, user.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        current.active = !current.active;
        let updated = Repository::<User>::update(&mut session, &current).await?;
        session.commit().await?;

        info!(user_id = updated.id, active = updated.active, "User status toggled");
        Ok(updated)
    }

    /// Hard delete; the user's memberships go first, in the same transaction
    pub async fn delete(&self, user: &User) -> AuthResult<()> {
        let mut session = self.storage.begin().await?;
        if Repository::<User>::lock(&mut session, user.id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let cleared = memberships::clear_user_in(&mut session, user.id).await?;
        Repository::<User>::delete(&mut session, user.id).await?;
        session.commit().await?;

        info!(user_id = user.id, memberships = cleared, "User deleted");
        Ok(())
    }
}

fn check_identity(username: &str, email: &str) -> AuthResult<()> {
    if !valid_username(username) {
        return Err(AuthError::InvalidUsername);
    }
    if !valid_email(email) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(())
}
