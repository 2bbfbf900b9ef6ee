// 应用配置定义

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

/// 估算服务提供商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Qwen,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            // "openai" 是 Qwen 的别名（OpenAI 兼容接口）
            "qwen" | "openai" => Ok(Self::Qwen),
            other => Err(format!("未知的 provider: {}", other)),
        }
    }
}

/// Gemini配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

fn default_gemini_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

/// Qwen配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QwenConfig {
    #[serde(default = "default_qwen_model")]
    pub model: String,
    #[serde(default = "default_qwen_base_url")]
    pub base_url: String,
}

fn default_qwen_model() -> String {
    "qwen-vl-max-latest".to_string()
}

fn default_qwen_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

impl Default for QwenConfig {
    fn default() -> Self {
        Self {
            model: default_qwen_model(),
            base_url: default_qwen_base_url(),
        }
    }
}

/// 摄像头朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    User,
    #[default]
    Environment,
}

/// 摄像头设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// 设备名（为空时使用平台默认设备）
    pub device: Option<String>,
    /// 理想宽度
    pub width: u32,
    /// 理想高度
    pub height: u32,
    pub facing: CameraFacing,
    /// JPEG质量(1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: None,
            width: 1280,
            height: 720,
            facing: CameraFacing::Environment,
            jpeg_quality: 80,
        }
    }
}

/// 持久化的应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    /// 估算服务提供商
    pub llm_provider: ProviderKind,
    /// 存放API密钥的环境变量名
    pub api_key_env: String,
    pub gemini: GeminiConfig,
    pub qwen: QwenConfig,
    pub storage: StorageConfig,
    pub camera: CameraSettings,
    /// 首页显示的最近记录数
    pub history_limit: usize,
    /// 是否在审核时尝试获取位置
    pub location_lookup: bool,
    /// HTTP请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            llm_provider: ProviderKind::default(),
            api_key_env: "API_KEY".to_string(),
            gemini: GeminiConfig::default(),
            qwen: QwenConfig::default(),
            storage: StorageConfig::default(),
            camera: CameraSettings::default(),
            history_limit: 5,
            location_lookup: false,
            request_timeout_secs: 300,
        }
    }
}

/// 配置的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub llm_provider: Option<ProviderKind>,
    pub api_key_env: Option<String>,
    pub gemini: Option<GeminiConfig>,
    pub qwen: Option<QwenConfig>,
    pub storage: Option<StorageConfig>,
    pub camera: Option<CameraSettings>,
    pub history_limit: Option<usize>,
    pub location_lookup: Option<bool>,
}
