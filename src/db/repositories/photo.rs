use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::entities::{photo_history, prelude::*, users};

/// Input for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub user_id: i32,
    pub photo_path: String,
    pub used_from: String,
    pub used_until: Option<String>,
    pub is_current: bool,
    pub from_estimated: bool,
}

/// How the previous current photo is disposed of when another takes over.
/// Applied inside the same transaction as the rest of the transition.
#[derive(Debug, Clone)]
pub enum Supersede {
    /// Nothing to displace.
    None,
    /// Close the row, stamping its end of validity.
    Close { id: i32, used_until: String },
    /// Drop the row entirely (replaced before the retention threshold).
    Discard { id: i32 },
    /// The avatar pointer had no ledger row; record it as a closed entry.
    Backfill(NewPhoto),
}

pub struct PhotoRepository {
    conn: DatabaseConnection,
}

impl PhotoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The single current record for this user, if any. The policy service
    /// keeps this unique; this lookup is the only sanctioned way to discover
    /// the active photo.
    pub async fn find_current(&self, user_id: i32) -> Result<Option<photo_history::Model>> {
        let record = PhotoHistory::find()
            .filter(photo_history::Column::UserId.eq(user_id))
            .filter(photo_history::Column::IsCurrent.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query current photo")?;

        Ok(record)
    }

    pub async fn exists_by_path(&self, user_id: i32, path: &str) -> Result<bool> {
        let record = PhotoHistory::find()
            .filter(photo_history::Column::UserId.eq(user_id))
            .filter(photo_history::Column::PhotoPath.eq(path))
            .one(&self.conn)
            .await
            .context("Failed to query photo by path")?;

        Ok(record.is_some())
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<photo_history::Model>> {
        let records = PhotoHistory::find()
            .filter(photo_history::Column::UserId.eq(user_id))
            .order_by_desc(photo_history::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list photo history")?;

        Ok(records)
    }

    pub async fn get(&self, id: i32) -> Result<Option<photo_history::Model>> {
        let record = PhotoHistory::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query photo by id")?;

        Ok(record)
    }

    pub async fn insert(&self, photo: NewPhoto) -> Result<photo_history::Model> {
        insert_row(&self.conn, photo).await
    }

    /// Record a freshly uploaded photo as current: dispose of the previous
    /// current record, insert the new row and move the avatar pointer, all
    /// in one transaction so a mid-sequence failure cannot leave the pointer
    /// without a matching current row.
    pub async fn insert_current(
        &self,
        user_id: i32,
        supersede: Supersede,
        photo: NewPhoto,
    ) -> Result<photo_history::Model> {
        let txn = self.conn.begin().await?;

        apply_supersede(&txn, supersede).await?;
        let model = insert_row(&txn, photo).await?;
        set_avatar(&txn, user_id, Some(&model.photo_path)).await?;

        txn.commit().await?;
        Ok(model)
    }

    /// Unset the current photo: close its row and clear the avatar pointer
    /// in one transaction. The record stays in history.
    pub async fn close_current(&self, user_id: i32, id: i32, used_until: &str) -> Result<()> {
        let txn = self.conn.begin().await?;

        close_row(&txn, id, used_until).await?;
        set_avatar(&txn, user_id, None).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Re-open an existing record as the current photo. Clears the current
    /// flag on every other record of the user first so the uniqueness
    /// invariant holds even if it was previously violated, then moves the
    /// avatar pointer, all in one transaction.
    pub async fn restore(
        &self,
        user_id: i32,
        id: i32,
        used_from: &str,
        supersede: Supersede,
    ) -> Result<photo_history::Model> {
        let txn = self.conn.begin().await?;

        apply_supersede(&txn, supersede).await?;

        PhotoHistory::update_many()
            .col_expr(photo_history::Column::IsCurrent, Expr::value(false))
            .filter(photo_history::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let record = PhotoHistory::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Photo record {id} not found"))?;

        let mut active: photo_history::ActiveModel = record.into();
        active.is_current = Set(true);
        active.used_from = Set(used_from.to_string());
        active.used_until = Set(None);
        active.from_estimated = Set(false);
        let model = active.update(&txn).await?;

        set_avatar(&txn, user_id, Some(&model.photo_path)).await?;

        txn.commit().await?;
        Ok(model)
    }

    /// Insert a backfilled current row for an unledgered avatar, closing a
    /// contradicting current row first when one exists.
    pub async fn backfill_current(
        &self,
        stale_id: Option<i32>,
        used_until: &str,
        photo: NewPhoto,
    ) -> Result<photo_history::Model> {
        let txn = self.conn.begin().await?;

        if let Some(id) = stale_id {
            close_row(&txn, id, used_until).await?;
        }
        let model = insert_row(&txn, photo).await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = PhotoHistory::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete photo record")?;

        Ok(result.rows_affected > 0)
    }

    /// Number of records flagged current for this user. Exposed for tests
    /// asserting the uniqueness invariant.
    pub async fn count_current(&self, user_id: i32) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let count = PhotoHistory::find()
            .filter(photo_history::Column::UserId.eq(user_id))
            .filter(photo_history::Column::IsCurrent.eq(true))
            .count(&self.conn)
            .await?;

        Ok(count)
    }
}

async fn insert_row<C: ConnectionTrait>(conn: &C, photo: NewPhoto) -> Result<photo_history::Model> {
    let now = chrono::Utc::now().to_rfc3339();

    let model = photo_history::ActiveModel {
        user_id: Set(photo.user_id),
        photo_path: Set(photo.photo_path),
        used_from: Set(photo.used_from),
        used_until: Set(photo.used_until),
        is_current: Set(photo.is_current),
        from_estimated: Set(photo.from_estimated),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .context("Failed to insert photo record")?;

    Ok(model)
}

async fn close_row<C: ConnectionTrait>(conn: &C, id: i32, used_until: &str) -> Result<()> {
    let record = PhotoHistory::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Photo record {id} not found"))?;

    let mut active: photo_history::ActiveModel = record.into();
    active.is_current = Set(false);
    active.used_until = Set(Some(used_until.to_string()));
    active.update(conn).await?;

    Ok(())
}

async fn apply_supersede<C: ConnectionTrait>(conn: &C, supersede: Supersede) -> Result<()> {
    match supersede {
        Supersede::None => {}
        Supersede::Close { id, used_until } => close_row(conn, id, &used_until).await?,
        Supersede::Discard { id } => {
            PhotoHistory::delete_by_id(id)
                .exec(conn)
                .await
                .context("Failed to discard superseded photo record")?;
        }
        Supersede::Backfill(photo) => {
            insert_row(conn, photo).await?;
        }
    }

    Ok(())
}

async fn set_avatar<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    avatar_path: Option<&str>,
) -> Result<()> {
    Users::update_many()
        .col_expr(
            users::Column::AvatarPath,
            Expr::value(avatar_path.map(ToString::to_string)),
        )
        .col_expr(
            users::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().to_rfc3339()),
        )
        .filter(users::Column::Id.eq(user_id))
        .exec(conn)
        .await
        .context("Failed to update avatar pointer")?;

    Ok(())
}
