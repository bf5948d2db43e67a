//! Document store implementations for pickroute.

pub mod in_memory;
pub mod file_backend;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use file_backend::FileStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use pickroute_core::DocumentStore;
use pickroute_core::error::StoreError;
use std::path::Path;
use std::sync::Arc;

/// Open the backend named `backend` ("memory", "file", "sqlite") at `path`.
pub async fn open(backend: &str, path: &Path) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match backend {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "file" => Ok(Arc::new(FileStore::new(path.to_path_buf())?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Storage(format!("Failed to create {}: {e}", parent.display()))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(SqliteStore::new(&url).await?))
        }
        other => Err(StoreError::Storage(format!(
            "Unsupported store backend '{other}'"
        ))),
    }
}
