// 测量记录存储 - 进程内记录列表及其持久化

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::StorageBackend;
use crate::models::MeasurementRecord;

/// 记录列表的固定存储键
pub const STORAGE_KEY: &str = "window_measurements";

#[derive(Debug, Error)]
pub enum StoreError {
    /// ID 已存在，列表未修改
    #[error("记录ID重复: {0}")]
    DuplicateId(String),
    /// 内存列表已更新，但写入失败
    #[error("保存记录失败: {0}")]
    Persist(#[source] anyhow::Error),
}

/// 进程范围的记录列表（新记录在前）
///
/// 每次变更都会整体重写存储内容
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    records: Vec<MeasurementRecord>,
}

impl RecordStore {
    /// 启动时加载记录，内容缺失或损坏时返回空列表
    pub async fn load(backend: Arc<dyn StorageBackend>) -> Self {
        let records = match backend.read(STORAGE_KEY).await {
            Ok(Some(bytes)) => parse_records(&bytes),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("读取测量记录失败，按空列表处理: {}", e);
                Vec::new()
            }
        };

        info!("已从 {} 存储加载 {} 条测量记录", backend.name(), records.len());
        Self { backend, records }
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    /// 最近的 n 条记录
    pub fn recent(&self, limit: usize) -> &[MeasurementRecord] {
        &self.records[..self.records.len().min(limit)]
    }

    pub fn get(&self, id: &str) -> Option<&MeasurementRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// 最新记录的时间戳
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 在列表头部插入新记录并持久化
    pub async fn prepend(&mut self, record: MeasurementRecord) -> Result<(), StoreError> {
        if self.contains(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        self.records.insert(0, record);
        self.save_all().await
    }

    /// 按ID删除记录，返回是否删除；ID不存在时不写入
    pub async fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Ok(false);
        }
        self.save_all().await?;
        Ok(true)
    }

    /// 整体写入当前列表
    pub async fn save_all(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.records).map_err(|e| StoreError::Persist(e.into()))?;
        self.backend
            .write(STORAGE_KEY, &bytes)
            .await
            .map_err(StoreError::Persist)
    }
}

/// 逐条解析，跳过无效或ID重复的记录；整体不是数组时按空列表处理
fn parse_records(bytes: &[u8]) -> Vec<MeasurementRecord> {
    let entries = match serde_json::from_slice::<Vec<serde_json::Value>>(bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("测量记录内容损坏，按空列表处理: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<MeasurementRecord>(entry) {
            Ok(record) if seen.insert(record.id.clone()) => records.push(record),
            Ok(record) => warn!("跳过ID重复的测量记录: {}", record.id),
            Err(e) => warn!("跳过无效的测量记录: {}", e),
        }
    }
    records
}
