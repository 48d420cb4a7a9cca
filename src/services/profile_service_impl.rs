//! `SeaORM` implementation of the `ProfileService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::types::{ProfileDto, UserDto};
use crate::db::Store;
use crate::entities::users;
use crate::services::photo_service::PhotoService;
use crate::services::profile_service::{ProfileError, ProfileService};
use crate::storage::PhotoStore;

pub struct SeaOrmProfileService {
    store: Store,
    photo_store: Arc<dyn PhotoStore>,
    photo_service: Arc<dyn PhotoService>,
}

impl SeaOrmProfileService {
    #[must_use]
    pub fn new(
        store: Store,
        photo_store: Arc<dyn PhotoStore>,
        photo_service: Arc<dyn PhotoService>,
    ) -> Self {
        Self {
            store,
            photo_store,
            photo_service,
        }
    }

    fn user_dto(&self, user: users::Model) -> UserDto {
        UserDto {
            id: user.id,
            name: user.name,
            email: user.email,
            email_verified: user.email_verified_at.is_some(),
            avatar_url: user.avatar_path.as_deref().map(|p| self.photo_store.url(p)),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[async_trait]
impl ProfileService for SeaOrmProfileService {
    async fn get_profile(&self, user_id: i32) -> Result<ProfileDto, ProfileError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(ProfileError::NotFound(user_id))?;

        let photo_history = self
            .photo_service
            .history(user_id)
            .await
            .map_err(|e| ProfileError::Internal(e.to_string()))?;

        Ok(ProfileDto {
            user: self.user_dto(user),
            photo_history,
        })
    }

    async fn update_profile(
        &self,
        user_id: i32,
        name: &str,
        email: &str,
    ) -> Result<ProfileDto, ProfileError> {
        let user = self
            .store
            .update_user_profile(user_id, name, email)
            .await?
            .ok_or(ProfileError::NotFound(user_id))?;

        let photo_history = self
            .photo_service
            .history(user_id)
            .await
            .map_err(|e| ProfileError::Internal(e.to_string()))?;

        Ok(ProfileDto {
            user: self.user_dto(user),
            photo_history,
        })
    }

    async fn delete_account(&self, user_id: i32, password: &str) -> Result<(), ProfileError> {
        let is_valid = self.store.verify_user_password_by_id(user_id, password).await?;

        if !is_valid {
            return Err(ProfileError::Validation("Password is incorrect".to_string()));
        }

        // Collect blob keys before the cascade removes the ledger.
        let photos = self.store.list_photos(user_id).await?;

        if !self.store.delete_user(user_id).await? {
            return Err(ProfileError::NotFound(user_id));
        }

        for photo in photos {
            if let Err(e) = self.photo_store.delete(&photo.photo_path).await {
                warn!(path = %photo.photo_path, "Failed to delete photo blob: {e}");
            }
        }

        info!(user_id, "Account deleted");

        Ok(())
    }
}
