// LLM插件系统 - 定义估算提供商接口和数据结构

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::capture::EncodedImage;
use crate::models::Centimeters;

/// 发送给模型的指令
pub const MEASUREMENT_PROMPT: &str = "Analyze this image of a window. Detect the main window in the frame. \
Estimate its width and height in centimeters (cm). \
If there is no physical reference object (like a credit card or person) in the frame, \
provide the most likely standard dimensions based on architectural patterns. \
Return the result in JSON format.";

/// 模型返回的尺寸估算（保存前的临时结果）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimationResult {
    /// 估算宽度（cm）
    pub width: Centimeters,
    /// 估算高度（cm）
    pub height: Centimeters,
    /// 置信度（0-1）
    pub confidence: f64,
    /// 估算依据
    pub reasoning: String,
}

/// 估算错误类型
#[derive(Debug, Error)]
pub enum EstimationError {
    /// 凭证缺失或无效
    #[error("API 凭证缺失或无效: {0}")]
    Credential(String),
    /// 请求失败或返回内容不符合约定
    #[error("图片分析失败: {0}")]
    AnalysisFailed(String),
    /// 网络传输失败（按分析失败处理）
    #[error("网络请求失败: {0}")]
    Transport(#[from] reqwest::Error),
}

/// 面向用户的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationErrorKind {
    Credential,
    Analysis,
}

impl EstimationError {
    pub fn kind(&self) -> EstimationErrorKind {
        match self {
            Self::Credential(_) => EstimationErrorKind::Credential,
            Self::AnalysisFailed(_) | Self::Transport(_) => EstimationErrorKind::Analysis,
        }
    }

    /// 展示给用户的提示
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            EstimationErrorKind::Credential => {
                "API 키가 없거나 올바르지 않습니다. API 키 환경 변수를 확인해주세요."
            }
            EstimationErrorKind::Analysis => "이미지 분석 중 오류가 발생했습니다. 다시 시도해주세요.",
        }
    }
}

/// 估算提供商接口
#[async_trait]
pub trait EstimationProvider: Send + Sync {
    /// 提供商名称
    fn name(&self) -> &str;

    /// 是否已配置凭证
    fn is_configured(&self) -> bool;

    /// 对一张图片进行尺寸估算（每次调用都会发起一次远程请求）
    async fn estimate(&self, image: &EncodedImage) -> Result<EstimationResult, EstimationError>;
}

/// 声明给模型的输出结构（四个字段均为必填）
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "width": {
                "type": "NUMBER",
                "description": "Estimated width of the window in cm"
            },
            "height": {
                "type": "NUMBER",
                "description": "Estimated height of the window in cm"
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence score from 0 to 1"
            },
            "reasoning": {
                "type": "STRING",
                "description": "Short explanation of how the size was determined"
            }
        },
        "required": ["width", "height", "confidence", "reasoning"]
    })
}

/// 严格解析模型返回的文本
pub fn parse_estimation(text: Option<&str>) -> Result<EstimationResult, EstimationError> {
    let text = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| EstimationError::AnalysisFailed("模型未返回内容".to_string()))?;

    let result: EstimationResult = serde_json::from_str(text)
        .map_err(|e| EstimationError::AnalysisFailed(format!("返回格式不正确: {}", e)))?;

    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(EstimationError::AnalysisFailed(format!(
            "置信度超出范围: {}",
            result.confidence
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let result = parse_estimation(Some(
            r#"{"width": 120, "height": 80, "confidence": 0.82, "reasoning": "standard casement proportions"}"#,
        ))
        .unwrap();
        assert_eq!(result.width.value(), 120.0);
        assert_eq!(result.height.value(), 80.0);
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.reasoning, "standard casement proportions");
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let err = parse_estimation(Some(r#"{"width": 120, "height": 80, "confidence": 0.5}"#))
            .unwrap_err();
        assert_eq!(err.kind(), EstimationErrorKind::Analysis);
    }

    #[test]
    fn test_parse_rejects_extra_field_and_prose() {
        assert!(parse_estimation(Some(
            r#"{"width": 1, "height": 1, "confidence": 0.5, "reasoning": "", "depth": 3}"#
        ))
        .is_err());
        assert!(parse_estimation(Some("The window is about 120cm wide.")).is_err());
    }

    #[test]
    fn test_parse_rejects_absent_payload() {
        assert!(matches!(
            parse_estimation(None),
            Err(EstimationError::AnalysisFailed(_))
        ));
        assert!(parse_estimation(Some("   ")).is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_numbers() {
        assert!(parse_estimation(Some(
            r#"{"width": 0, "height": 80, "confidence": 0.5, "reasoning": "x"}"#
        ))
        .is_err());
        assert!(parse_estimation(Some(
            r#"{"width": 100, "height": 80, "confidence": 1.5, "reasoning": "x"}"#
        ))
        .is_err());
        assert!(parse_estimation(Some(
            r#"{"width": "100", "height": 80, "confidence": 0.5, "reasoning": "x"}"#
        ))
        .is_err());
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["width", "height", "confidence", "reasoning"]);
        assert_eq!(schema["properties"]["reasoning"]["type"], "STRING");
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let credential = EstimationError::Credential("missing".to_string());
        let analysis = EstimationError::AnalysisFailed("bad".to_string());
        assert_eq!(credential.kind(), EstimationErrorKind::Credential);
        assert_eq!(analysis.kind(), EstimationErrorKind::Analysis);
        assert_ne!(credential.user_message(), analysis.user_message());
    }
}
