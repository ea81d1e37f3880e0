//! Reply adapter for the Gemini `generateContent` endpoint
//!
//! [`ReplyGenerator`] is the seam the conversation controller talks to;
//! [`GeminiClient`] is the production implementation. Errors stay typed as
//! [`AdapterError`] until the caller collapses them into transcript text.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::config::Config;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Shown when no credential is configured
pub const CONFIGURATION_ERROR_TEXT: &str =
    "Error: API_KEY is not configured. Please set the environment variable to use the application.";

/// Shown for any failure during or after the network call
pub const PROVIDER_ERROR_TEXT: &str = "An error occurred while communicating with the AI. \
     Please check the log file for details and ensure your API key is valid.";

/// A local image to send along with the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub media_type: String,
}

/// Everything the adapter needs for one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub prompt: String,
    pub image: Option<ImageAttachment>,
}

impl ReplyRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    /// No credential; detected before any network I/O
    #[error("API key is not configured")]
    Configuration,
    #[error("provider request failed: {0}")]
    Provider(String),
}

impl AdapterError {
    /// Fixed text for the transcript
    pub fn user_message(&self) -> &'static str {
        match self {
            AdapterError::Configuration => CONFIGURATION_ERROR_TEXT,
            AdapterError::Provider(_) => PROVIDER_ERROR_TEXT,
        }
    }

    pub fn log(&self) {
        match self {
            AdapterError::Configuration => warn!("reply skipped: API key is not configured"),
            AdapterError::Provider(detail) => error!(error = %detail, "Gemini API call failed"),
        }
    }
}

/// Turns a prompt (and optional image) into the assistant's reply
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, AdapterError>;
}

/// Generate a reply, collapsing every failure into its fixed user-facing text.
pub async fn generate_reply(generator: &dyn ReplyGenerator, request: &ReplyRequest) -> String {
    match generator.generate(request).await {
        Ok(text) => text,
        Err(e) => {
            e.log();
            e.user_message().to_string()
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData { inline_data: InlineData },
    Text { text: String },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_key())
            .with_base_url(config.base_url())
            .with_model(config.model())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Image part first, text part last
    async fn build_parts(request: &ReplyRequest) -> Result<Vec<RequestPart>, AdapterError> {
        let mut parts = Vec::with_capacity(2);

        if let Some(image) = &request.image {
            let bytes = tokio::fs::read(&image.path).await.map_err(|e| {
                AdapterError::Provider(format!("failed to read {}: {}", image.path.display(), e))
            })?;
            parts.push(RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: image.media_type.clone(),
                    data: STANDARD.encode(bytes),
                },
            });
        }

        parts.push(RequestPart::Text {
            text: request.prompt.clone(),
        });
        Ok(parts)
    }

    #[instrument(skip(self, request), fields(model = %self.model, has_image = request.image.is_some()))]
    pub async fn query(&self, request: &ReplyRequest) -> Result<String, AdapterError> {
        let api_key = self.credential().ok_or(AdapterError::Configuration)?;

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: Self::build_parts(request).await?,
            }],
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Provider(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Provider(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map_or(text, |e| e.message);
            return Err(AdapterError::Provider(format!(
                "Gemini API error ({status}): {message}"
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| AdapterError::Provider(format!("failed to parse response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(AdapterError::Provider(format!("Gemini API error: {}", err.message)));
        }

        let reply = extract_text(parsed)?;
        debug!(chars = reply.chars().count(), "Received Gemini response");
        Ok(reply)
    }
}

/// Concatenated text parts of the first candidate
fn extract_text(response: GeminiResponse) -> Result<String, AdapterError> {
    let content = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .ok_or_else(|| AdapterError::Provider("no candidates in response".to_string()))?;

    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(AdapterError::Provider("empty response".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, AdapterError> {
        self.query(request).await
    }
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiClient")
            .field("api_key", &self.credential().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
