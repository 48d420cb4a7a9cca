use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    PhotoService, ProfileService, SeaOrmPhotoService, SeaOrmProfileService,
};
use crate::storage::{DiskPhotoStore, PhotoStore};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub photo_store: Arc<dyn PhotoStore>,

    pub photo_service: Arc<dyn PhotoService>,

    pub profile_service: Arc<dyn ProfileService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let photo_store: Arc<dyn PhotoStore> = Arc::new(DiskPhotoStore::new(
            config.storage.photos_path.clone(),
            config.storage.public_base_path.clone(),
        ));

        let config_arc = Arc::new(RwLock::new(config));

        let photo_service = Arc::new(SeaOrmPhotoService::new(
            store.clone(),
            photo_store.clone(),
            config_arc.clone(),
        )) as Arc<dyn PhotoService>;

        let profile_service = Arc::new(SeaOrmProfileService::new(
            store.clone(),
            photo_store.clone(),
            photo_service.clone(),
        )) as Arc<dyn ProfileService>;

        Ok(Self {
            config: config_arc,
            store,
            photo_store,
            photo_service,
            profile_service,
        })
    }
}
