//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod fs;
pub mod memory;
pub mod telemetry;
pub mod uploads;

use std::sync::Arc;

use tracing::info;

use crate::application::repos::PostBackend;
use crate::config::{FileSettings, StorageBackend, StorageSettings};

use self::{
    db::PostgresBackend, error::InfraError, fs::FileBackend, memory::MemoryBackend,
    uploads::FileStore,
};

/// Build the backend selected in settings, running migrations for Postgres.
pub async fn open_backend(
    storage: &StorageSettings,
    files: &FileSettings,
) -> Result<Arc<dyn PostBackend>, InfraError> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("using volatile in-memory storage");
            Ok(Arc::new(MemoryBackend::new()))
        }
        StorageBackend::File => {
            let store = FileStore::new(files.directory.clone(), files.url_prefix.clone())?;
            let backend = FileBackend::open(&storage.content_dir, store)?;
            info!(dir = %storage.content_dir.display(), "using flat-file storage");
            Ok(Arc::new(backend))
        }
        StorageBackend::Postgres { ref url } => {
            let store = FileStore::new(files.directory.clone(), files.url_prefix.clone())?;
            let pool = PostgresBackend::connect(url, storage.max_connections.get()).await?;
            PostgresBackend::run_migrations(&pool).await?;
            let backend = PostgresBackend::new(pool, store);
            backend.health_check().await?;
            info!("using postgres storage");
            Ok(Arc::new(backend))
        }
    }
}
