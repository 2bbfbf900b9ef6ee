// 存储配置定义

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 存储后端配置类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BackendConfig {
    /// JSON 文件配置
    #[serde(rename = "json")]
    JsonFile {
        /// 存储目录（相对路径基于数据目录）
        dir: String,
    },
    /// SQLite 配置
    #[serde(rename = "sqlite")]
    SQLite {
        /// 数据库文件路径（相对路径基于数据目录）
        db_path: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::JsonFile {
            dir: "records".to_string(),
        }
    }
}

impl BackendConfig {
    /// 基于数据目录解析实际路径
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        let raw = match self {
            BackendConfig::JsonFile { dir } => dir,
            BackendConfig::SQLite { db_path } => db_path,
        };
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            data_dir.join(path)
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// 后端配置
    #[serde(default)]
    pub backend: BackendConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_tagged_serde() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"backend":{"type":"sqlite","db_path":"data/sw.db"}}"#)
                .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::SQLite {
                db_path: "data/sw.db".to_string()
            }
        );
        assert_eq!(
            config.backend.resolve_path(Path::new("/tmp/app")),
            PathBuf::from("/tmp/app/data/sw.db")
        );
    }

    #[test]
    fn test_absolute_path_is_kept() {
        let backend = BackendConfig::JsonFile {
            dir: "/var/lib/sw".to_string(),
        };
        assert_eq!(
            backend.resolve_path(Path::new("/tmp/app")),
            PathBuf::from("/var/lib/sw")
        );
    }
}
