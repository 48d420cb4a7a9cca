use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{photo_history, users};

pub mod migrator;
pub mod repositories;

pub use repositories::photo::{NewPhoto, Supersede};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn photo_repo(&self) -> repositories::photo::PhotoRepository {
        repositories::photo::PhotoRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    // ========== Photo Ledger ==========

    pub async fn find_current_photo(&self, user_id: i32) -> Result<Option<photo_history::Model>> {
        self.photo_repo().find_current(user_id).await
    }

    pub async fn photo_exists_by_path(&self, user_id: i32, path: &str) -> Result<bool> {
        self.photo_repo().exists_by_path(user_id, path).await
    }

    pub async fn list_photos(&self, user_id: i32) -> Result<Vec<photo_history::Model>> {
        self.photo_repo().list_for_user(user_id).await
    }

    pub async fn get_photo(&self, id: i32) -> Result<Option<photo_history::Model>> {
        self.photo_repo().get(id).await
    }

    pub async fn insert_photo(&self, photo: NewPhoto) -> Result<photo_history::Model> {
        self.photo_repo().insert(photo).await
    }

    pub async fn insert_current_photo(
        &self,
        user_id: i32,
        supersede: Supersede,
        photo: NewPhoto,
    ) -> Result<photo_history::Model> {
        self.photo_repo()
            .insert_current(user_id, supersede, photo)
            .await
    }

    pub async fn close_current_photo(
        &self,
        user_id: i32,
        id: i32,
        used_until: &str,
    ) -> Result<()> {
        self.photo_repo().close_current(user_id, id, used_until).await
    }

    pub async fn restore_photo(
        &self,
        user_id: i32,
        id: i32,
        used_from: &str,
        supersede: Supersede,
    ) -> Result<photo_history::Model> {
        self.photo_repo()
            .restore(user_id, id, used_from, supersede)
            .await
    }

    pub async fn backfill_current_photo(
        &self,
        stale_id: Option<i32>,
        used_until: &str,
        photo: NewPhoto,
    ) -> Result<photo_history::Model> {
        self.photo_repo()
            .backfill_current(stale_id, used_until, photo)
            .await
    }

    pub async fn delete_photo(&self, id: i32) -> Result<bool> {
        self.photo_repo().delete(id).await
    }

    pub async fn count_current_photos(&self, user_id: i32) -> Result<u64> {
        self.photo_repo().count_current(user_id).await
    }

    // ========== Users ==========

    pub async fn get_user(&self, id: i32) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<Option<i32>> {
        self.user_repo()
            .verify_password_by_email(email, password)
            .await
    }

    pub async fn verify_user_password_by_id(&self, id: i32, password: &str) -> Result<bool> {
        self.user_repo().verify_password_by_id(id, password).await
    }

    pub async fn update_user_profile(
        &self,
        id: i32,
        name: &str,
        email: &str,
    ) -> Result<Option<users::Model>> {
        self.user_repo().update_profile(id, name, email).await
    }

    pub async fn set_user_avatar(&self, id: i32, avatar_path: Option<&str>) -> Result<()> {
        self.user_repo().set_avatar(id, avatar_path).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }
}
