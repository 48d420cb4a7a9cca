use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::entities::users;

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user)
    }

    /// Verify credentials and return the user id on success.
    /// Note: Argon2 verification is CPU-intensive, so it runs in a blocking
    /// task instead of on the async runtime.
    pub async fn verify_password_by_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<i32>> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };

        let id = user.id;
        let is_valid = verify_hash(user.password_hash, password.to_string()).await?;

        Ok(is_valid.then_some(id))
    }

    /// Verify the password of an already-authenticated user, e.g. the
    /// re-confirmation step before account deletion.
    pub async fn verify_password_by_id(&self, id: i32, password: &str) -> Result<bool> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(false);
        };

        verify_hash(user.password_hash, password.to_string()).await
    }

    /// Update name and email. Changing the email clears the verification
    /// timestamp, forcing the address to be re-verified.
    pub async fn update_profile(
        &self,
        id: i32,
        name: &str,
        email: &str,
    ) -> Result<Option<users::Model>> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let email_changed = user.email != email;
        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.name = Set(name.to_string());
        active.email = Set(email.to_string());
        if email_changed {
            active.email_verified_at = Set(None);
        }
        active.updated_at = Set(now);
        let model = active.update(&self.conn).await?;

        Ok(Some(model))
    }

    pub async fn set_avatar(&self, id: i32, avatar_path: Option<&str>) -> Result<()> {
        let user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.avatar_path = Set(avatar_path.map(ToString::to_string));
        active.updated_at = Set(now);
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Delete the user row; photo history rows cascade.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

async fn verify_hash(password_hash: String, password: String) -> Result<bool> {
    let is_valid = task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        let argon2 = Argon2::default();
        Ok::<bool, anyhow::Error>(
            argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")??;

    Ok(is_valid)
}
