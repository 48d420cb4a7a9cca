//! `SeaORM` implementation of the `PhotoService` trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::api::types::PhotoDto;
use crate::config::Config;
use crate::db::{NewPhoto, Store, Supersede};
use crate::entities::photo_history;
use crate::services::photo_service::{
    AddToHistoryOutcome, PhotoError, PhotoService, RemoveOutcome,
};
use crate::storage::PhotoStore;

/// Per-user async locks. Transitions for one user must not interleave or the
/// single-current invariant can be violated by concurrent requests; records
/// are fully partitioned by user so no cross-user locking is needed.
#[derive(Default)]
struct UserLocks {
    inner: StdMutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, user_id: i32) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        map.entry(user_id).or_default().clone()
    }
}

pub struct SeaOrmPhotoService {
    store: Store,
    photo_store: Arc<dyn PhotoStore>,
    config: Arc<RwLock<Config>>,
    locks: UserLocks,
}

impl SeaOrmPhotoService {
    #[must_use]
    pub fn new(store: Store, photo_store: Arc<dyn PhotoStore>, config: Arc<RwLock<Config>>) -> Self {
        Self {
            store,
            photo_store,
            config,
            locks: UserLocks::default(),
        }
    }

    fn to_dto(&self, model: photo_history::Model) -> PhotoDto {
        PhotoDto {
            id: model.id,
            photo_url: self.photo_store.url(&model.photo_path),
            photo_path: model.photo_path,
            used_from: model.used_from,
            used_until: model.used_until,
            is_current: model.is_current,
            from_estimated: model.from_estimated,
            created_at: model.created_at,
        }
    }

    async fn avatar_path(&self, user_id: i32) -> Result<Option<String>, PhotoError> {
        let user = self.store.get_user(user_id).await?;
        Ok(user.and_then(|u| u.avatar_path))
    }

    /// Decide how the previous current photo is closed out before a new one
    /// takes over. The returned disposition is applied inside the same
    /// transaction as the rest of the transition; the second element is a
    /// blob path to delete after commit, when the disposition drops a row.
    ///
    /// If the avatar has no ledger row yet, a closed backfill row is written
    /// so the photo is not lost from history. An existing current row is
    /// closed when it was current for at least `min_retention_minutes`;
    /// below the threshold it is dropped entirely so rapid swaps do not
    /// clutter history (threshold 0 archives everything). Caller holds the
    /// user lock.
    async fn plan_supersede(
        &self,
        user_id: i32,
        now: &str,
    ) -> Result<(Supersede, Option<String>), PhotoError> {
        let Some(current) = self.store.find_current_photo(user_id).await? else {
            let Some(avatar) = self.avatar_path(user_id).await? else {
                return Ok((Supersede::None, None));
            };
            if self.store.photo_exists_by_path(user_id, &avatar).await? {
                return Ok((Supersede::None, None));
            }
            return Ok((
                Supersede::Backfill(NewPhoto {
                    user_id,
                    photo_path: avatar,
                    used_from: day_ago_rfc3339(),
                    used_until: Some(now.to_string()),
                    is_current: false,
                    from_estimated: true,
                }),
                None,
            ));
        };

        let min_retention = i64::from(self.config.read().await.photos.min_retention_minutes);

        if minutes_since(&current.used_from) >= min_retention {
            Ok((
                Supersede::Close {
                    id: current.id,
                    used_until: now.to_string(),
                },
                None,
            ))
        } else {
            // Sub-threshold swap: the row goes, and its blob with it.
            Ok((Supersede::Discard { id: current.id }, Some(current.photo_path)))
        }
    }

    /// Best-effort removal of a blob dropped by a `Supersede::Discard`.
    async fn discard_blob(&self, path: Option<String>) {
        if let Some(path) = path {
            if let Err(e) = self.photo_store.delete(&path).await {
                warn!(path = %path, "Failed to delete superseded photo blob: {e}");
            }
        }
    }
}

#[async_trait]
impl PhotoService for SeaOrmPhotoService {
    async fn upload(
        &self,
        user_id: i32,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<PhotoDto, PhotoError> {
        if !content_type.starts_with("image/") {
            return Err(PhotoError::Validation(format!(
                "Profile photo must be an image, got {content_type}"
            )));
        }

        let max_bytes = self.config.read().await.photos.max_upload_bytes;
        if bytes.is_empty() {
            return Err(PhotoError::Validation("Uploaded photo is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(PhotoError::Validation(format!(
                "Photo exceeds the maximum size of {max_bytes} bytes"
            )));
        }

        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        // Blob first: a storage failure must abort before any pointer moves.
        let path = self
            .photo_store
            .put(bytes, content_type)
            .await
            .map_err(|e| PhotoError::Storage(e.to_string()))?;

        let now = now_rfc3339();
        let (supersede, discarded) = self.plan_supersede(user_id, &now).await?;

        // Disposition, new row and avatar pointer commit or roll back
        // together.
        let model = self
            .store
            .insert_current_photo(
                user_id,
                supersede,
                NewPhoto {
                    user_id,
                    photo_path: path,
                    used_from: now,
                    used_until: None,
                    is_current: true,
                    from_estimated: false,
                },
            )
            .await?;

        self.discard_blob(discarded).await;

        Ok(self.to_dto(model))
    }

    async fn remove(&self, user_id: i32) -> Result<RemoveOutcome, PhotoError> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        self.backfill(user_id).await?;

        let Some(current) = self.store.find_current_photo(user_id).await? else {
            return Ok(RemoveOutcome::NoPhoto);
        };

        let now = now_rfc3339();
        self.store
            .close_current_photo(user_id, current.id, &now)
            .await?;

        Ok(RemoveOutcome::Removed)
    }

    async fn set_as_current(&self, user_id: i32, photo_id: i32) -> Result<PhotoDto, PhotoError> {
        // Lock before loading: a record read outside the lock can go stale
        // while another transition for the same user holds it.
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let record = self
            .store
            .get_photo(photo_id)
            .await?
            .ok_or(PhotoError::NotFound(photo_id))?;

        if record.user_id != user_id {
            return Err(PhotoError::Forbidden);
        }

        if record.is_current {
            return Ok(self.to_dto(record));
        }

        let now = now_rfc3339();
        let (supersede, discarded) = self.plan_supersede(user_id, &now).await?;

        // restore clears every other current flag in the same transaction,
        // restoring uniqueness even if it had been violated.
        let model = self
            .store
            .restore_photo(user_id, photo_id, &now, supersede)
            .await?;

        self.discard_blob(discarded).await;

        Ok(self.to_dto(model))
    }

    async fn add_to_history(&self, user_id: i32) -> Result<AddToHistoryOutcome, PhotoError> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let Some(avatar) = self.avatar_path(user_id).await? else {
            return Ok(AddToHistoryOutcome::NoPhoto);
        };

        if self.store.photo_exists_by_path(user_id, &avatar).await? {
            return Ok(AddToHistoryOutcome::AlreadyPresent);
        }

        self.store
            .insert_photo(NewPhoto {
                user_id,
                photo_path: avatar,
                used_from: day_ago_rfc3339(),
                used_until: Some(now_rfc3339()),
                is_current: false,
                from_estimated: true,
            })
            .await?;

        Ok(AddToHistoryOutcome::Added)
    }

    async fn delete_photo(&self, user_id: i32, photo_id: i32) -> Result<(), PhotoError> {
        // Lock before loading and checking: a concurrent restore could flip
        // the record to current after an unlocked check passed, and the
        // delete would then tear out the avatar from under the pointer.
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let record = self
            .store
            .get_photo(photo_id)
            .await?
            .ok_or(PhotoError::NotFound(photo_id))?;

        if record.user_id != user_id {
            return Err(PhotoError::Forbidden);
        }

        if record.is_current {
            return Err(PhotoError::InvalidOperation(
                "Cannot delete the current profile photo. Change it first.".to_string(),
            ));
        }

        self.store.delete_photo(record.id).await?;

        // Blob deletion is best-effort, and after the row so a failure here
        // cannot leave a ledger row pointing at a missing blob.
        if self.photo_store.exists(&record.photo_path).await {
            if let Err(e) = self.photo_store.delete(&record.photo_path).await {
                warn!(path = %record.photo_path, "Failed to delete photo blob: {e}");
            }
        }

        Ok(())
    }

    async fn ensure_current_in_history(&self, user_id: i32) -> Result<(), PhotoError> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        self.backfill(user_id).await
    }

    async fn history(&self, user_id: i32) -> Result<Vec<PhotoDto>, PhotoError> {
        {
            let lock = self.locks.for_user(user_id);
            let _guard = lock.lock().await;
            self.backfill(user_id).await?;
        }

        let records = self.store.list_photos(user_id).await?;
        Ok(records.into_iter().map(|m| self.to_dto(m)).collect())
    }
}

impl SeaOrmPhotoService {
    /// Backfill body shared by `ensure_current_in_history` and the
    /// operations that must see a consistent ledger first. Caller holds the
    /// user lock.
    async fn backfill(&self, user_id: i32) -> Result<(), PhotoError> {
        let Some(avatar) = self.avatar_path(user_id).await? else {
            return Ok(());
        };

        if self.store.photo_exists_by_path(user_id, &avatar).await? {
            return Ok(());
        }

        // A current row with a different path would contradict the avatar
        // pointer; it is closed in the same transaction as the backfilled
        // row taking the flag.
        let stale = self.store.find_current_photo(user_id).await?;

        self.store
            .backfill_current_photo(
                stale.map(|s| s.id),
                &now_rfc3339(),
                NewPhoto {
                    user_id,
                    photo_path: avatar,
                    used_from: day_ago_rfc3339(),
                    used_until: None,
                    is_current: true,
                    from_estimated: true,
                },
            )
            .await?;

        Ok(())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Approximate adoption time used when the real one was never recorded.
/// Rows written with this carry `from_estimated = true`.
fn day_ago_rfc3339() -> String {
    (Utc::now() - Duration::days(1)).to_rfc3339()
}

/// Whole minutes since an RFC3339 timestamp. Unparseable timestamps count
/// as old so a corrupt row is archived rather than silently dropped.
fn minutes_since(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339).map_or(i64::MAX, |t| {
        (Utc::now() - t.with_timezone(&Utc)).num_minutes()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_since_recent_timestamp() {
        let now = Utc::now().to_rfc3339();
        assert_eq!(minutes_since(&now), 0);
    }

    #[test]
    fn test_minutes_since_old_timestamp() {
        let old = (Utc::now() - Duration::hours(2)).to_rfc3339();
        assert_eq!(minutes_since(&old), 120);
    }

    #[test]
    fn test_minutes_since_garbage_counts_as_old() {
        assert_eq!(minutes_since("not-a-timestamp"), i64::MAX);
    }
}
