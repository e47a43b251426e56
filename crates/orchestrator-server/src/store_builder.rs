//! Picks and constructs the configured storage backend.

use std::sync::Arc;

use anyhow::Result;
use orchestrator_core::TaskStore;

use crate::config::Config;

#[cfg(feature = "sqlite")]
pub async fn build(config: &Config) -> Result<Arc<dyn TaskStore>> {
    use orchestrator_core::{SqliteStoreConfig, SqliteTaskStore};
    use std::path::PathBuf;

    let store = SqliteTaskStore::with_config(SqliteStoreConfig {
        database_path: PathBuf::from(&config.database_path),
        max_connections: 5u32,
    })
    .await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
pub async fn build(_config: &Config) -> Result<Arc<dyn TaskStore>> {
    use orchestrator_core::InMemoryTaskStore;
    Ok(Arc::new(InMemoryTaskStore::new()))
}
