use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::{PersistedSettings, SettingsUpdate};

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedSettings>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice::<PersistedSettings>(&bytes).unwrap_or_else(|e| {
                    warn!("配置文件解析失败，使用默认配置: {}", e);
                    PersistedSettings::default()
                })
            }
            _ => {
                let default = PersistedSettings::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
        })
    }

    pub async fn get(&self) -> PersistedSettings {
        self.data.read().await.clone()
    }

    pub async fn update(&self, update: SettingsUpdate) -> Result<PersistedSettings> {
        let mut config = self.data.write().await;

        if let Some(provider) = update.llm_provider {
            config.llm_provider = provider;
        }
        if let Some(env) = update.api_key_env {
            config.api_key_env = env;
        }
        if let Some(gemini) = update.gemini {
            config.gemini = gemini;
        }
        if let Some(qwen) = update.qwen {
            config.qwen = qwen;
        }
        if let Some(storage) = update.storage {
            config.storage = storage;
        }
        if let Some(camera) = update.camera {
            config.camera = camera;
        }
        if let Some(limit) = update.history_limit {
            config.history_limit = limit;
        }
        if let Some(lookup) = update.location_lookup {
            config.location_lookup = lookup;
        }

        self.save(&config).await?;
        Ok(config.clone())
    }

    async fn save(&self, config: &PersistedSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
