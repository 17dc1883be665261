//! User service
//!
//! Profile lookup and self-service profile updates.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::models::{UpdateUserInput, User};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::password::hash_password;

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Apply a partial profile update.
    ///
    /// A changed email has to be verified again; a new password is re-hashed.
    pub async fn update(&self, id: &str, input: UpdateUserInput) -> ServiceResult<User> {
        let mut user = self.get_by_id(id).await?;

        if let Some(email) = input.email {
            if email != user.email {
                if self.user_repo.get_by_email(&email).await?.is_some() {
                    return Err(ServiceError::conflict("Email is already registered"));
                }
                user.email = email;
                user.is_email_verified = false;
            }
        }
        if let Some(username) = input.username {
            if username != user.username {
                if self.user_repo.get_by_username(&username).await?.is_some() {
                    return Err(ServiceError::conflict("Username is already taken"));
                }
                user.username = username;
            }
        }
        if let Some(password) = input.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(first_name) = input.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = input.bio {
            user.bio = Some(bio);
        }
        if let Some(avatar) = input.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(expertise) = input.expertise {
            user.expertise = expertise;
        }
        if let Some(roles) = input.roles {
            user.roles = roles;
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }
}
