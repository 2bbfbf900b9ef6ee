// 内存存储实现（测试用）

use super::StorageBackend;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置某个键的内容
    pub fn with_entry(key: &str, value: &[u8]) -> Self {
        let backend = Self::default();
        if let Ok(mut entries) = backend.entries.lock() {
            entries.insert(key.to_string(), value.to_vec());
        }
        backend
    }

    /// 当前保存的内容
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().ok().and_then(|m| m.get(key).cloned())
    }

    /// 成功写入次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 模拟写入失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("内存存储锁已损坏"))?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("模拟写入失败"));
        }
        let mut entries = self.entries.lock().map_err(|_| anyhow!("内存存储锁已损坏"))?;
        entries.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
