//! Gemini `generateContent` REST client.

use std::path::Path;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scorecard_models::content_type_for;

use crate::config::GeminiConfig;
use crate::error::{GeminiError, GeminiResult};

/// How the model gets to see the clip.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoInput {
    /// Raw bytes sent base64-encoded in the request.
    Inline { mime_type: String, data: Vec<u8> },
    /// A URL mentioned in the prompt.
    Reference { url: String },
}

impl VideoInput {
    /// Read a clip from disk as an inline part.
    pub async fn inline_from_file(path: impl AsRef<Path>) -> GeminiResult<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        Ok(Self::Inline {
            mime_type: content_type_for(name).to_string(),
            data,
        })
    }

    pub fn reference(url: impl Into<String>) -> Self {
        Self::Reference { url: url.into() }
    }

    fn into_part(self) -> Part {
        match self {
            VideoInput::Inline { mime_type, data } => Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
            VideoInput::Reference { url } => Part::Text {
                text: format!("Video URL: {}", url),
            },
        }
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Text produced by one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
}

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("scorecard-gemini/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> GeminiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Send a prompt plus video, trying each configured model in order.
    pub async fn generate(&self, prompt: &str, video: &VideoInput) -> GeminiResult<Generation> {
        let parts = vec![
            Part::Text {
                text: prompt.to_string(),
            },
            video.clone().into_part(),
        ];

        let mut last_error = None;

        for model in &self.config.models {
            info!("Attempting Gemini API with model: {}", model);
            match self.call_model(model, &parts).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "Gemini analysis received");
                    return Ok(Generation {
                        text,
                        model: model.clone(),
                    });
                }
                Err(e) if e.is_auth_error() => {
                    warn!("Gemini rejected the API key: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(GeminiError::AllModelsFailed))
    }

    /// Connectivity check: fetch the primary model's description.
    pub async fn check_model(&self) -> GeminiResult<()> {
        let url = format!(
            "{}/v1beta/models/{}",
            self.config.base_url,
            self.config.primary_model()
        );
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GeminiError::api(status.as_u16(), body))
        }
    }

    async fn call_model(&self, model: &str, parts: &[Part]) -> GeminiResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: parts.to_vec(),
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::api(status.as_u16(), body));
        }

        let body: GeminiResponse = response.json().await?;
        extract_text(body)
    }
}

fn extract_text(response: GeminiResponse) -> GeminiResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::empty_response(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GeminiError::empty_response("no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = strip_code_fence(text.trim()).trim().to_string();
    if text.is_empty() {
        return Err(GeminiError::empty_response(format!(
            "finish reason {}",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    debug!(chars = text.len(), "Extracted Gemini text");
    Ok(text)
}

/// Remove a surrounding markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, models: &[&str]) -> GeminiClient {
        let mut config = GeminiConfig::new("AIzaTest");
        config.base_url = server.uri();
        config.models = models.iter().map(|m| m.to_string()).collect();
        GeminiClient::new(config).unwrap()
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```text\nKEY METRICS:\n```"), "KEY METRICS:\n");
        assert_eq!(strip_code_fence("plain"), "plain");
    }

    #[test]
    fn test_inline_part_serialization() {
        let part = VideoInput::Inline {
            mime_type: "video/mp4".into(),
            data: b"abc".to_vec(),
        }
        .into_part();
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "video/mp4");
        assert_eq!(json["inlineData"]["data"], "YWJj");

        let json = serde_json::to_value(VideoInput::reference("gs://b/o.mp4").into_part()).unwrap();
        assert_eq!(json["text"], "Video URL: gs://b/o.mp4");
    }

    #[tokio::test]
    async fn test_generate_sends_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIzaTest"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"maxOutputTokens": 2048}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("KEY METRICS:\nArm: A - clean")))
            .expect(1)
            .mount(&server)
            .await;

        let gen = client(&server, &["gemini-2.0-flash"])
            .generate("analyze", &VideoInput::reference("https://x/clip.mp4"))
            .await
            .unwrap();
        assert_eq!(gen.model, "gemini-2.0-flash");
        assert!(gen.text.starts_with("KEY METRICS:"));
    }

    #[tokio::test]
    async fn test_generate_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/backup:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
            .mount(&server)
            .await;

        let gen = client(&server, &["primary", "backup"])
            .generate("p", &VideoInput::reference("u"))
            .await
            .unwrap();
        assert_eq!(gen.model, "backup");
    }

    #[tokio::test]
    async fn test_generate_all_fail_returns_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server, &["a", "b"])
            .generate("p", &VideoInput::reference("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_auth_error_stops_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, &["a", "b"])
            .generate("p", &VideoInput::reference("u"))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = client(&server, &["a"])
            .generate("p", &VideoInput::reference("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::EmptyResponse(ref m) if m.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_check_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models/gemini-2.0-flash"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "models/gemini-2.0-flash"})))
            .mount(&server)
            .await;

        client(&server, &["gemini-2.0-flash"]).check_model().await.unwrap();
        assert!(client(&server, &["missing"]).check_model().await.is_err());
    }
}
