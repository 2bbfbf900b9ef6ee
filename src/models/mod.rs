// 数据模型模块 - 定义测量记录和应用配置

pub mod config;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use config::{
    CameraFacing, CameraSettings, GeminiConfig, PersistedSettings, ProviderKind, QwenConfig,
    SettingsUpdate,
};
pub use crate::llm::plugin::EstimationResult;

/// 未填写位置时使用的标签
pub const UNSPECIFIED_LOCATION: &str = "미지정 위치";

/// 厘米长度（只能是有限的正数）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Centimeters(f64);

impl Centimeters {
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Centimeters {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("尺寸必须为正数: {}", value))
    }
}

impl From<Centimeters> for f64 {
    fn from(value: Centimeters) -> Self {
        value.0
    }
}

impl fmt::Display for Centimeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 已保存的窗户测量记录
///
/// 字段顺序即持久化顺序，修改会影响存储内容的字节一致性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// 保存时分配的唯一ID
    pub id: String,
    pub width_cm: Centimeters,
    pub height_cm: Centimeters,
    /// 位置标签（空时为 UNSPECIFIED_LOCATION）
    pub location_name: String,
    /// 自包含的 data URL
    pub image_url: String,
    /// 创建时间（Unix毫秒）
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// 模型置信度（0-1）
    pub confidence: f64,
}

impl MeasurementRecord {
    /// 空白位置归一化为默认标签
    pub fn normalize_location(name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            UNSPECIFIED_LOCATION.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// 本地时间格式的测量时间
    pub fn formatted_time(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp).single() {
            Some(time) => time.format("%Y. %m. %d. %H:%M:%S").to_string(),
            None => self.timestamp.to_string(),
        }
    }

    /// 列表卡片用的简短时间
    pub fn short_time(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp).single() {
            Some(time) => time.format("%m월 %d일 %H:%M").to_string(),
            None => self.timestamp.to_string(),
        }
    }

    pub fn confidence_percent(&self) -> u32 {
        confidence_percent(self.confidence)
    }

    /// 分享用的固定格式摘要
    pub fn share_text(&self) -> String {
        format!(
            "[창문 측정 결과]\n위치: {}\n사이즈: 가로 {}cm x 세로 {}cm\n측정일시: {}",
            self.location_name,
            self.width_cm,
            self.height_cm,
            self.formatted_time()
        )
    }
}

/// 0-1 置信度转换为百分比
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u32
}
