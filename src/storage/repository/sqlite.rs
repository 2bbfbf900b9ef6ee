// SQLite 存储实现

use super::StorageBackend;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

/// SQLite 键值存储实现
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// 创建新的 SQLite 数据库连接
    pub async fn new(db_path: &str) -> Result<Self> {
        info!("初始化 SQLite 数据库: {}", db_path);

        // 确保数据库文件的目录存在
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        // 单一流程写入，无需大连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .idle_timeout(std::time::Duration::from_secs(300))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await?;

        let backend = Self { pool };

        // 初始化表结构
        backend.initialize_tables().await?;

        Ok(backend)
    }

    async fn initialize_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 获取连接池引用
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Vec<u8>, _>("value")?)),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
