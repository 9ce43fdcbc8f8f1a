use crate::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Response shape shared by all generators: zero or more candidates, each
/// holding zero or more text parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// A response with a single candidate holding `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
            }],
        }
    }
}

/// Text of the first candidate, parts concatenated.
///
/// No candidates is not an error: the caller gets an empty string.
pub fn response_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// What the narrative code talks to. `GeminiClient` is the production
/// implementation; tests substitute their own.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<GenerateResponse, GeneratorError>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Blocking client; one request in flight at a time, never retried.
#[derive(Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(GeneratorError::MissingApiKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<GenerateResponse, GeneratorError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };
        debug!(model = %self.config.model, prompt_len = prompt.len(), "calling text generator");
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = resp.text()?;
        serde_json::from_str(&text).map_err(|e| GeneratorError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_candidates_is_empty_text() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response_text(&resp), "");
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response_text(&resp), "");
    }

    #[test]
    fn first_candidate_parts_are_joined() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        let resp: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response_text(&resp), "Hello, world");
    }

    #[test]
    fn candidate_without_content_is_empty_text() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(response_text(&resp), "");
    }

    #[test]
    fn client_requires_api_key() {
        let err = GeminiClient::new(GeminiConfig::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::MissingApiKey));
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: Some("k".into()),
            base_url: "http://localhost:1/v1beta/".into(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
