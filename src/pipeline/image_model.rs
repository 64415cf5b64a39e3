//! Image-model seam and the Gemini `generateContent` client behind it.
//!
//! The image stage only needs "prompt in, candidates out". [`ImageModel`]
//! expresses that; [`GeminiImageModel`] implements it over the REST API.
//! The wire types follow the `generateContent` response envelope:
//! candidates → content → parts, where a part carries either text or
//! base64 `inlineData` tagged with a MIME type.

use crate::config::{DeckConfig, ImageSize};
use crate::error::DeckError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Aspect ratio requested for every slide.
pub const SLIDE_ASPECT_RATIO: &str = "16:9";

/// Per-request image settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequestConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

impl ImageRequestConfig {
    pub fn new(size: ImageSize) -> Self {
        Self {
            aspect_ratio: SLIDE_ASPECT_RATIO.to_string(),
            image_size: size.as_api_str().to_string(),
        }
    }
}

impl Default for ImageRequestConfig {
    fn default() -> Self {
        Self::new(ImageSize::default())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Content container used in both requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a content block. Unknown part kinds deserialise with both
/// fields empty and are skipped by the image stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64_data.into(),
            }),
        }
    }
}

/// Base64 payload tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Top-level `generateContent` response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One alternative answer. A blocked answer may carry no content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// A response with one candidate holding `parts`.
    pub fn with_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content { role: None, parts }),
                finish_reason: None,
            }],
        }
    }

    /// First inline-data part of the first candidate.
    pub fn first_inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref().filter(|d| !d.data.is_empty()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 2],
    image_config: &'a ImageRequestConfig,
}

// ── Trait ────────────────────────────────────────────────────────────────

/// An image-generation model.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Send one prompt and return the raw candidates.
    async fn generate(
        &self,
        prompt: &str,
        config: &ImageRequestConfig,
    ) -> Result<GenerateContentResponse, DeckError>;
}

// ── Gemini client ────────────────────────────────────────────────────────

/// [`ImageModel`] over the Gemini REST API.
pub struct GeminiImageModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiImageModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, DeckError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DeckError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build the client from config; the API key is mandatory.
    pub fn from_config(config: &DeckConfig) -> Result<Self, DeckError> {
        let api_key = config
            .resolve_image_api_key()
            .ok_or_else(|| DeckError::ProviderNotConfigured {
                provider: "gemini-image".to_string(),
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) to generate slide images.".to_string(),
            })?;
        Self::new(
            &config.image_base_url,
            &config.image_model,
            api_key,
            config.api_timeout_secs,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    async fn generate(
        &self,
        prompt: &str,
        config: &ImageRequestConfig,
    ) -> Result<GenerateContentResponse, DeckError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
                image_config: config,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeckError::ImageApiError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeckError::ImageApiError {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| DeckError::ImageApiError {
                status: status.as_u16(),
                message: format!("Malformed response body: {e}"),
            })?;
        debug!(
            "Image model {} returned {} candidate(s)",
            self.model,
            parsed.candidates.len()
        );
        Ok(parsed)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}
