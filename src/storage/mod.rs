// 存储模块 - 测量记录的本地持久化

// 子模块
pub mod config;
pub mod record_store;
pub mod repository;

// 重新导出主要类型
pub use config::{BackendConfig, StorageConfig};
pub use record_store::{RecordStore, StoreError, STORAGE_KEY};
pub use repository::StorageBackend;

// 重新导出具体实现
pub use repository::json_file::JsonFileBackend;
#[cfg(test)]
pub use repository::memory::MemoryBackend;
pub use repository::sqlite::SqliteBackend;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// 根据配置打开存储后端
pub async fn open_backend(config: &StorageConfig, data_dir: &Path) -> Result<Arc<dyn StorageBackend>> {
    let path = config.backend.resolve_path(data_dir);
    let backend: Arc<dyn StorageBackend> = match &config.backend {
        BackendConfig::JsonFile { .. } => Arc::new(JsonFileBackend::new(path).await?),
        BackendConfig::SQLite { .. } => Arc::new(SqliteBackend::new(&path.to_string_lossy()).await?),
    };
    Ok(backend)
}
