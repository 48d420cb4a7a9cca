//! Account-level profile operations: viewing and editing the user's
//! identity fields and deleting the account.

use crate::api::types::ProfileDto;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("User {0} not found")]
    NotFound(i32),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ProfileError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProfileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait ProfileService: Send + Sync {
    /// Current profile, including the full photo history.
    async fn get_profile(&self, user_id: i32) -> Result<ProfileDto, ProfileError>;

    /// Update name and email. Changing the email clears its verified status.
    async fn update_profile(
        &self,
        user_id: i32,
        name: &str,
        email: &str,
    ) -> Result<ProfileDto, ProfileError>;

    /// Delete the account after re-confirming the password. Photo rows
    /// cascade; blobs are cleaned up best-effort.
    async fn delete_account(&self, user_id: i32, password: &str) -> Result<(), ProfileError>;
}
