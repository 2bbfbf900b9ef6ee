// Repository 抽象层 - 定义键值存储接口

pub mod json_file;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

/// 存储后端接口 - 所有存储实现必须实现此 trait
///
/// 每个键对应一份完整内容，写入即整体替换
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// 读取键对应的内容，不存在时返回 None
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 整体替换键对应的内容
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// 后端名称
    fn name(&self) -> &str;
}
