//! Roles: creation, editing, search and deletion

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use super::memberships;
use crate::error::{AuthError, AuthResult};
use crate::models::{NewRole, Role, RoleChanges, Saved};
use crate::repositories::{Repository, Session, Storage};
use crate::validation::{valid_description, valid_role_name};

/// How [`RoleStore::search`] compares names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMatch {
    /// Case-sensitive equality
    Exact,
    /// Case-sensitive containment
    #[default]
    Contains,
}

/// Owner of the `role` rows
pub struct RoleStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for RoleStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> RoleStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> AuthResult<Role> {
        check_role(name, description)?;

        let mut session = self.storage.begin().await?;
        let new_role = NewRole {
            name: name.to_string(),
            description: description.map(str::to_string),
        };

        let role = Repository::<Role>::insert(&mut session, new_role)
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;
        session
            .commit()
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;

        info!(role_id = role.id, name = %role.name, "Role created");
        Ok(role)
    }

    /// Create the role, or refresh the description of an existing one
    pub async fn ensure(&self, name: &str, description: Option<&str>) -> AuthResult<Saved<Role>> {
        check_role(name, description)?;

        let mut session = self.storage.begin().await?;
        let saved = match session.find_role_by_name(name).await? {
            Some(mut role) => {
                if let Some(description) = description {
                    role.description = Some(description.to_string());
                    role = Repository::<Role>::update(&mut session, &role).await?;
                }
                Saved::Updated(role)
            }
            None => {
                let new_role = NewRole {
                    name: name.to_string(),
                    description: description.map(str::to_string),
                };
                let role = Repository::<Role>::insert(&mut session, new_role)
                    .await
                    .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;
                Saved::Created(role)
            }
        };
        session
            .commit()
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;

        info!(
            role_id = saved.get().id,
            created = saved.is_created(),
            "Role ensured"
        );
        Ok(saved)
    }

    /// Partial update; omitted fields stay as they are
    pub async fn edit(&self, role: &Role, changes: RoleChanges) -> AuthResult<Role> {
        if let Some(name) = &changes.name {
            if !valid_role_name(name) {
                return Err(AuthError::InvalidRoleName);
            }
        }
        if !valid_description(changes.description.as_deref()) {
            return Err(AuthError::InvalidDescription);
        }

        let mut session = self.storage.begin().await?;
        let mut current = Repository::<Role>::lock(&mut session, role.id)
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        if let Some(name) = changes.name {
            current.name = name;
        }
        if let Some(description) = changes.description {
            current.description = Some(description);
        }

        let updated = Repository::<Role>::update(&mut session, &current)
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;
        session
            .commit()
            .await
            .map_err(|e| AuthError::on_conflict(e, AuthError::RoleAlreadyExists))?;

        info!(role_id = updated.id, name = %updated.name, "Role edited");
        Ok(updated)
    }

    /// Find roles by name; no match in either mode is `RoleNotFound`
    pub async fn search(&self, name: &str, mode: NameMatch) -> AuthResult<Vec<Role>> {
        let roles = match mode {
            NameMatch::Exact => vec![self.by_name(name).await?],
            NameMatch::Contains => {
                let mut session = self.storage.begin().await?;
                session.search_roles(name).await?
            }
        };

        if roles.is_empty() {
            return Err(AuthError::RoleNotFound);
        }
        Ok(roles)
    }

    pub async fn by_name(&self, name: &str) -> AuthResult<Role> {
        let mut session = self.storage.begin().await?;
        session
            .find_role_by_name(name)
            .await?
            .ok_or(AuthError::RoleNotFound)
    }

    pub async fn by_id(&self, id: i64) -> AuthResult<Role> {
        let mut session = self.storage.begin().await?;
        Repository::<Role>::get(&mut session, id)
            .await?
            .ok_or(AuthError::RoleNotFound)
    }

    /// Newest roles first
    pub async fn list(&self, limit: i64) -> AuthResult<Vec<Role>> {
        let mut session = self.storage.begin().await?;
        Ok(session.list_roles(limit).await?)
    }

    pub async fn toggle_active(&self, role: &Role) -> AuthResult<Role> {
        let mut session = self.storage.begin().await?;
        let mut current = Repository::<Role>::lock(&mut session, role.id)
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        current.active = !current.active;
        let updated = Repository::<Role>::update(&mut session, &current).await?;
        session.commit().await?;

        info!(role_id = updated.id, active = updated.active, "Role status toggled");
        Ok(updated)
    }

    /// Delete the role after clearing its memberships, in one transaction
    pub async fn delete(&self, role: &Role) -> AuthResult<()> {
        let mut session = self.storage.begin().await?;
        if Repository::<Role>::lock(&mut session, role.id).await?.is_none() {
            return Err(AuthError::RoleNotFound);
        }

        let cleared = memberships::clear_role_in(&mut session, role.id).await?;
        Repository::<Role>::delete(&mut session, role.id).await?;
        session.commit().await?;

        info!(role_id = role.id, memberships = cleared, "Role deleted");
        Ok(())
    }
}

fn check_role(name: &str, description: Option<&str>) -> AuthResult<()> {
    if !valid_role_name(name) {
        return Err(AuthError::InvalidRoleName);
    }
    if !valid_description(description) {
        return Err(AuthError::InvalidDescription);
    }
    Ok(())
}
