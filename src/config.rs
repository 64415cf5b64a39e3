//! Configuration for a deck-generation run.
//!
//! All behaviour is controlled through [`DeckConfig`], built via its
//! [`DeckConfigBuilder`]. One struct covers all three stages so a run can be
//! logged, compared or re-run from a single value.

use crate::error::DeckError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default text provider: the pipeline was designed around Gemini models.
pub const DEFAULT_PROVIDER: &str = "gemini";
/// Default model for the strategist stage.
pub const DEFAULT_PLANNER_MODEL: &str = "gemini-2.0-flash";
/// Default model for the art-director stage.
pub const DEFAULT_COMPOSER_MODEL: &str = "gemini-2.5-flash";
/// Default image-generation model.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
/// Default REST root for the image-generation endpoint.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Directory that holds one timestamped sub-directory per run.
pub const DEFAULT_OUTPUT_ROOT: &str = "public/slides";
/// LibreOffice binary used for `.docx` → PDF conversion.
pub const DEFAULT_SOFFICE: &str = "soffice";

/// Configuration for a pitch-deck run.
///
/// # Example
/// ```rust
/// use pitchdeck::{DeckConfig, ImageSize};
///
/// let config = DeckConfig::builder()
///     .planner_model("gemini-2.5-pro")
///     .image_size(ImageSize::FourK)
///     .output_root("out/slides")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DeckConfig {
    /// Pre-constructed text provider used for both text stages.
    /// Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Text provider name (e.g. "gemini", "openai", "anthropic").
    /// If None, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Model for stage 1 (deck planning). Default: `gemini-2.0-flash`.
    pub planner_model: String,

    /// Model for stage 2 (image prompts). Default: `gemini-2.5-flash`.
    pub composer_model: String,

    /// Sampling temperature for both text stages. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens per text-stage reply. Default: 8192.
    ///
    /// A nine-slide prompt set with full scene descriptions runs to several
    /// thousand tokens; a truncated reply fails JSON parsing.
    pub max_tokens: usize,

    /// Replacement for the built-in strategist instruction.
    pub strategist_prompt: Option<String>,

    /// Replacement for the built-in art-director instruction.
    pub art_director_prompt: Option<String>,

    /// Image-generation model id. Default: `gemini-3-pro-image-preview`.
    pub image_model: String,

    /// API key for the image endpoint. Falls back to `GEMINI_API_KEY`,
    /// then `GOOGLE_API_KEY`.
    pub image_api_key: Option<String>,

    /// REST root of the image endpoint.
    pub image_base_url: String,

    /// Resolution tier requested from the image model. Default: 2K.
    pub image_size: ImageSize,

    /// Parent directory for timestamped run directories. Default: `public/slides`.
    pub output_root: PathBuf,

    /// Write every slide of the run into exactly this directory instead.
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout for the image endpoint in seconds.
    ///
    /// None (the default) waits as long as the HTTP client does.
    pub api_timeout_secs: Option<u64>,

    /// LibreOffice binary used by [`crate::pipeline::document::convert_to_pdf`].
    pub soffice_path: PathBuf,

    /// Receives stage and per-slide events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            provider: None,
            provider_name: None,
            planner_model: DEFAULT_PLANNER_MODEL.to_string(),
            composer_model: DEFAULT_COMPOSER_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 8192,
            strategist_prompt: None,
            art_director_prompt: None,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_api_key: None,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            image_size: ImageSize::default(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            output_dir: None,
            api_timeout_secs: None,
            soffice_path: std::env::var_os("PITCHDECK_SOFFICE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOFFICE)),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DeckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeckConfig")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("planner_model", &self.planner_model)
            .field("composer_model", &self.composer_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("image_model", &self.image_model)
            .field("image_api_key", &self.image_api_key.as_ref().map(|_| "<redacted>"))
            .field("image_base_url", &self.image_base_url)
            .field("image_size", &self.image_size)
            .field("output_root", &self.output_root)
            .field("output_dir", &self.output_dir)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("soffice_path", &self.soffice_path)
            .finish()
    }
}

impl DeckConfig {
    /// Create a new builder for `DeckConfig`.
    pub fn builder() -> DeckConfigBuilder {
        DeckConfigBuilder {
            config: Self::default(),
        }
    }

    /// The image API key from config or environment.
    pub fn resolve_image_api_key(&self) -> Option<String> {
        self.image_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| non_empty_env("GEMINI_API_KEY"))
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Builder for [`DeckConfig`].
#[derive(Debug)]
pub struct DeckConfigBuilder {
    config: DeckConfig,
}

impl DeckConfigBuilder {
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.config.planner_model = model.into();
        self
    }

    pub fn composer_model(mut self, model: impl Into<String>) -> Self {
        self.config.composer_model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn strategist_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.strategist_prompt = Some(prompt.into());
        self
    }

    pub fn art_director_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.art_director_prompt = Some(prompt.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn image_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.image_api_key = Some(key.into());
        self
    }

    pub fn image_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.image_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn image_size(mut self, size: ImageSize) -> Self {
        self.config.image_size = size;
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DeckConfig, DeckError> {
        let c = &self.config;
        if c.planner_model.trim().is_empty() || c.composer_model.trim().is_empty() {
            return Err(DeckError::InvalidConfig(
                "planner and composer model ids must not be empty".into(),
            ));
        }
        if c.image_model.trim().is_empty() {
            return Err(DeckError::InvalidConfig(
                "image model id must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DeckError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(DeckError::InvalidConfig(
                "api_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        if !c.image_base_url.starts_with("http://") && !c.image_base_url.starts_with("https://") {
            return Err(DeckError::InvalidConfig(format!(
                "image_base_url must be an HTTP(S) URL, got '{}'",
                c.image_base_url
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resolution tier requested from the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// Roughly 1024 px on the long edge.
    OneK,
    /// Roughly 2048 px on the long edge. (default)
    #[default]
    TwoK,
    /// Roughly 4096 px on the long edge.
    FourK,
}

impl ImageSize {
    /// Value sent in `generationConfig.imageConfig.imageSize`.
    pub fn as_api_str(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}
