// JSON 文件存储实现

use super::StorageBackend;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// 每个键保存为目录下的 `<key>.json` 文件
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        info!("初始化 JSON 文件存储: {:?}", dir);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(anyhow!("无效的存储键: {}", key));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        // 先写临时文件再重命名，避免写一半的内容
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("已写入 {:?} ({} 字节)", path, value.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}
