// Google Gemini 提供商实现 - 使用 responseSchema 约束结构化输出

use super::plugin::*;
use crate::capture::EncodedImage;
use crate::models::GeminiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// Gemini提供商
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiResponse {
    /// 拼接第一个候选中的所有文本片段
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiProvider {
    /// 创建新的Gemini提供商（接受共享的HTTP客户端以复用连接池）
    pub fn new(client: Client, config: &GeminiConfig, api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// 构建请求体：指令 + 内联图片 + 输出结构声明
    pub fn build_request_body(&self, image: &EncodedImage) -> Value {
        json!({
            "contents": [
                {
                    "parts": [
                        { "text": MEASUREMENT_PROMPT },
                        {
                            "inline_data": {
                                "mime_type": image.mime_type(),
                                "data": image.base64_payload()
                            }
                        }
                    ]
                }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        })
    }

    fn classify_http_error(status: StatusCode, body: &str) -> EstimationError {
        let credential_problem = status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || body.contains("API_KEY_INVALID")
            || body.contains("API key not valid");

        if credential_problem {
            EstimationError::Credential(format!("Gemini 拒绝了 API key ({})", status))
        } else {
            EstimationError::AnalysisFailed(format!("Gemini API调用失败 ({}): {}", status, body))
        }
    }
}

#[async_trait]
impl EstimationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn estimate(&self, image: &EncodedImage) -> Result<EstimationResult, EstimationError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EstimationError::Credential("Gemini API key未配置".to_string()))?;

        let start_time = std::time::Instant::now();
        let request_body = self.build_request_body(image);

        debug!(
            "调用Gemini API: model={}, image={} 字节",
            self.model,
            image.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Gemini API错误: {} {}", status, response_text);
            return Err(Self::classify_http_error(status, &response_text));
        }

        let response_data: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| EstimationError::AnalysisFailed(format!("无法解析Gemini响应: {}", e)))?;

        if let Some(reason) = response_data
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                warn!("Gemini 响应非正常结束 (finishReason={})", reason);
            }
        }

        let result = parse_estimation(response_data.text().as_deref());
        match &result {
            Ok(estimate) => info!(
                "Gemini 估算完成: {}x{}cm, confidence={:.2}, 耗时 {}ms",
                estimate.width,
                estimate.height,
                estimate.confidence,
                start_time.elapsed().as_millis()
            ),
            Err(e) => error!("Gemini 返回内容无法使用: {}", e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_server::{spawn_canned_server, CannedResponse};

    fn image() -> EncodedImage {
        EncodedImage::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn provider(base_url: String, api_key: Option<&str>) -> GeminiProvider {
        let config = GeminiConfig {
            base_url,
            ..Default::default()
        };
        GeminiProvider::new(Client::new(), &config, api_key.map(str::to_string))
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider("http://localhost".to_string(), Some("k"));
        let body = provider.build_request_body(&image());

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], MEASUREMENT_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "/9j/4A==");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn test_endpoint_uses_model() {
        let provider = provider("https://example.test/v1beta/".to_string(), Some("k"));
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_credential_error() {
        let provider = provider("http://127.0.0.1:9".to_string(), None);
        assert!(!provider.is_configured());
        let err = provider.estimate(&image()).await.unwrap_err();
        assert_eq!(err.kind(), EstimationErrorKind::Credential);
    }

    #[tokio::test]
    async fn test_blank_key_counts_as_missing() {
        let provider = provider("http://127.0.0.1:9".to_string(), Some("  "));
        let err = provider.estimate(&image()).await.unwrap_err();
        assert!(matches!(err, EstimationError::Credential(_)));
    }

    #[tokio::test]
    async fn test_successful_estimate() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"width\": 120, \"height\": 80, \"confidence\": 0.82, \"reasoning\": \"standard casement proportions\"}"}]},
                "finishReason": "STOP"
            }]
        })
        .to_string();
        let (base_url, request) = spawn_canned_server(CannedResponse::ok(body)).await;

        let provider = provider(base_url, Some("secret-key"));
        let result = provider.estimate(&image()).await.unwrap();
        assert_eq!(result.width.value(), 120.0);
        assert_eq!(result.height.value(), 80.0);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /models/gemini-3-flash-preview:generateContent"));
        assert!(request.to_lowercase().contains("x-goog-api-key: secret-key"));
        assert!(request.contains("\"responseSchema\""));
    }

    #[tokio::test]
    async fn test_invalid_key_response_is_credential_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let (base_url, _request) =
            spawn_canned_server(CannedResponse::new(400, "Bad Request", body)).await;

        let err = provider(base_url, Some("wrong")).estimate(&image()).await.unwrap_err();
        assert_eq!(err.kind(), EstimationErrorKind::Credential);
    }

    #[tokio::test]
    async fn test_server_error_is_analysis_error() {
        let (base_url, _request) =
            spawn_canned_server(CannedResponse::new(500, "Internal Server Error", "{}")).await;

        let err = provider(base_url, Some("k")).estimate(&image()).await.unwrap_err();
        assert_eq!(err.kind(), EstimationErrorKind::Analysis);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_analysis_error() {
        let (base_url, _request) =
            spawn_canned_server(CannedResponse::ok(r#"{"candidates":[]}"#.to_string())).await;

        let err = provider(base_url, Some("k")).estimate(&image()).await.unwrap_err();
        assert!(matches!(err, EstimationError::AnalysisFailed(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_analysis_error() {
        // 绑定后立即释放端口，确保连接被拒绝
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(format!("http://{}", addr), Some("k"))
            .estimate(&image())
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::Transport(_)));
        assert_eq!(err.kind(), EstimationErrorKind::Analysis);
    }
}
