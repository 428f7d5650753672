pub mod activation;
pub mod coupons;
pub mod database;
pub mod memory;
pub mod resolver;
pub mod store;
pub mod verifier;

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use database::DatabaseService;
use memory::MemoryStore;
use store::Stores;

/// Picks the backend named by `DATABASE_URL`.
pub async fn connect_stores(config: &DatabaseConfig) -> Result<Stores, StoreError> {
    if config.is_in_process() {
        log::info!("Using in-process store; state is lost on restart");
        return Ok(Stores::from_backend(Arc::new(MemoryStore::new())));
    }

    let database = DatabaseService::new(config).await?;
    Ok(Stores::from_backend(Arc::new(database)))
}
