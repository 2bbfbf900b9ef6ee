// 阿里通义千问提供商实现 - OpenAI 兼容接口，JSON 对象模式

use super::plugin::*;
use crate::capture::EncodedImage;
use crate::models::QwenConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// Qwen提供商（阿里通义千问）
pub struct QwenProvider {
    api_key: Option<String>,
    model: String,
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QwenResponse {
    #[serde(default)]
    choices: Vec<QwenChoice>,
}

#[derive(Debug, Deserialize)]
struct QwenChoice {
    message: QwenMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QwenMessage {
    content: Option<String>,
}

impl QwenProvider {
    /// 创建新的Qwen提供商（接受共享的HTTP客户端以复用连接池）
    pub fn new(client: Client, config: &QwenConfig, api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            client,
            base_url: config.base_url.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// JSON 对象模式不支持结构声明，需要写进提示词
    fn build_prompt(&self) -> String {
        format!(
            r#"{}

## Output Format (CRITICAL):
Return ONLY a JSON object with exactly these four fields:
{{
  "width": <number, estimated width in cm>,
  "height": <number, estimated height in cm>,
  "confidence": <number between 0 and 1>,
  "reasoning": "<short explanation of how the size was determined>"
}}"#,
            MEASUREMENT_PROMPT
        )
    }

    pub fn build_request_body(&self, image: &EncodedImage) -> Value {
        json!({
            "model": self.model,
            "response_format": {"type": "json_object"},  // 保证结构化输出
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": { "url": image.to_data_url() }
                        },
                        {
                            "type": "text",
                            "text": self.build_prompt()
                        }
                    ]
                }
            ],
            "max_tokens": 1024,
            "temperature": 0.2
        })
    }
}

#[async_trait]
impl EstimationProvider for QwenProvider {
    fn name(&self) -> &str {
        "Qwen"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn estimate(&self, image: &EncodedImage) -> Result<EstimationResult, EstimationError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EstimationError::Credential("Qwen API key未配置".to_string()))?;

        let start_time = std::time::Instant::now();
        let request_body = self.build_request_body(image);

        debug!(
            "调用Qwen API: model={}, base_url={}",
            self.model, self.base_url
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Qwen API错误: {}", response_text);
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(EstimationError::Credential(format!(
                    "Qwen 拒绝了 API key ({})",
                    status
                )));
            }
            return Err(EstimationError::AnalysisFailed(format!(
                "Qwen API调用失败 ({}): {}",
                status, response_text
            )));
        }

        let response_data: QwenResponse = serde_json::from_str(&response_text)
            .map_err(|e| EstimationError::AnalysisFailed(format!("无法解析Qwen响应: {}", e)))?;

        let choice = response_data.choices.first();

        // 如果是 "length" 说明达到 token 限制，内容不完整
        if choice.and_then(|c| c.finish_reason.as_deref()) == Some("length") {
            warn!("LLM 响应因达到 token 限制而被截断 (finish_reason=length)");
            return Err(EstimationError::AnalysisFailed(
                "LLM 响应被截断（达到 max_tokens 限制）".to_string(),
            ));
        }

        let content = choice.and_then(|c| c.message.content.as_deref());
        let result = parse_estimation(content);
        if let Ok(estimate) = &result {
            info!(
                "Qwen 估算完成: {}x{}cm, 耗时 {}ms",
                estimate.width,
                estimate.height,
                start_time.elapsed().as_millis()
            );
        }
        result
    }
}
