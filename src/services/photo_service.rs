//! Domain service for the profile photo ledger.
//!
//! Owns every transition of the "current photo" state: upload, remove,
//! restore, manual retention and deletion. The ledger invariant (at most one
//! current record per user, mirrored by the user's `avatar_path`) is
//! enforced here, not by the schema.

use crate::api::types::PhotoDto;
use thiserror::Error;

/// Result of removing the current photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// No photo was set; nothing to remove.
    NoPhoto,
}

/// Result of manually pinning the current photo into history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddToHistoryOutcome {
    Added,
    /// No photo is set; nothing to add.
    NoPhoto,
    /// The current photo already has a ledger row.
    AlreadyPresent,
}

/// Errors specific to photo operations.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Photo {0} not found")]
    NotFound(i32),

    /// Ownership mismatch. Deliberately carries no detail so the response
    /// cannot leak whether the record exists for another user.
    #[error("Unauthorized action")]
    Forbidden,

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for PhotoError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for PhotoError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Domain service trait for photo transitions.
#[async_trait::async_trait]
pub trait PhotoService: Send + Sync {
    /// Store a new photo blob and make it the current avatar, superseding
    /// any previous one.
    async fn upload(
        &self,
        user_id: i32,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<PhotoDto, PhotoError>;

    /// Unset the current photo. The record stays in history.
    async fn remove(&self, user_id: i32) -> Result<RemoveOutcome, PhotoError>;

    /// Restore a history photo as the current avatar.
    async fn set_as_current(&self, user_id: i32, photo_id: i32) -> Result<PhotoDto, PhotoError>;

    /// Pin the current photo into history as a distinct, closed entry
    /// without changing current state.
    async fn add_to_history(&self, user_id: i32) -> Result<AddToHistoryOutcome, PhotoError>;

    /// Delete a non-current photo and, best-effort, its blob.
    async fn delete_photo(&self, user_id: i32, photo_id: i32) -> Result<(), PhotoError>;

    /// Idempotent backfill: if the avatar points at a path with no ledger
    /// row, record it as current with an estimated start time.
    async fn ensure_current_in_history(&self, user_id: i32) -> Result<(), PhotoError>;

    /// Full history, newest first, with resolved URLs. Runs the backfill
    /// before listing.
    async fn history(&self, user_id: i32) -> Result<Vec<PhotoDto>, PhotoError>;
}
