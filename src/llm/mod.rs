// LLM模块 - 窗户尺寸估算服务

pub mod gemini;
pub mod plugin;
pub mod qwen;

pub use gemini::GeminiProvider;
pub use plugin::{
    parse_estimation, response_schema, EstimationError, EstimationErrorKind, EstimationProvider,
    EstimationResult, MEASUREMENT_PROMPT,
};
pub use qwen::QwenProvider;

use crate::models::{PersistedSettings, ProviderKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 创建共享的 HTTP 客户端（复用连接池）
pub fn build_http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(10)
        .build()?;
    Ok(client)
}

/// 从环境变量读取API密钥
pub fn api_key_from_env(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// 根据配置创建估算提供商
pub fn build_provider(
    settings: &PersistedSettings,
    client: reqwest::Client,
) -> Arc<dyn EstimationProvider> {
    let api_key = api_key_from_env(&settings.api_key_env);
    if api_key.is_none() {
        warn!(
            "环境变量 {} 未设置，分析请求将返回凭证错误",
            settings.api_key_env
        );
    }

    let provider: Arc<dyn EstimationProvider> = match settings.llm_provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(client, &settings.gemini, api_key)),
        ProviderKind::Qwen => Arc::new(QwenProvider::new(client, &settings.qwen, api_key)),
    };
    info!(
        "估算提供商: {} (api_key_configured={})",
        provider.name(),
        provider.is_configured()
    );
    provider
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_follows_settings() {
        let client = reqwest::Client::new();
        let mut settings = PersistedSettings::default();
        settings.api_key_env = "SMART_WINDOW_TEST_KEY_UNSET".to_string();

        let provider = build_provider(&settings, client.clone());
        assert_eq!(provider.name(), "Gemini");
        assert!(!provider.is_configured());

        settings.llm_provider = ProviderKind::Qwen;
        let provider = build_provider(&settings, client);
        assert_eq!(provider.name(), "Qwen");
    }

    #[test]
    fn test_api_key_from_env_ignores_blank() {
        std::env::set_var("SMART_WINDOW_TEST_BLANK_KEY", "  ");
        assert!(api_key_from_env("SMART_WINDOW_TEST_BLANK_KEY").is_none());
        std::env::set_var("SMART_WINDOW_TEST_REAL_KEY", "abc");
        assert_eq!(
            api_key_from_env("SMART_WINDOW_TEST_REAL_KEY").as_deref(),
            Some("abc")
        );
    }
}
