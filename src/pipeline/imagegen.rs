//! Stage 3: one image-model call per slide prompt.
//!
//! Slides are generated strictly in input order, one request at a time. A
//! failed slide is recorded and the batch moves on; nothing is retried.
//!
//! ## Output layout
//!
//! ```text
//! <output_root>/2026-10-15_093012/slide_01.png
//!                                  slide_02.jpg
//!                                  …
//! ```
//!
//! A run directory is claimed with a non-recursive `create_dir`; if the
//! timestamped name is taken, `-2`, `-3`, … are tried in turn. An explicit
//! output directory is used as-is and existing slide files are overwritten.

use crate::config::DeckConfig;
use crate::error::{DeckError, SlideError};
use crate::output::{BatchGenerationResult, GenerationResult};
use crate::pipeline::image_model::{ImageModel, ImageRequestConfig};
use crate::schema::NanoBananaPrompt;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Slide number used when an entry has none.
pub const DEFAULT_SLIDE_NUMBER: u32 = 1;

/// Upper bound on `-N` suffixes tried for one timestamp.
const MAX_RUN_DIR_SUFFIX: u32 = 1000;

/// One prompt as handed to [`generate_all_slides`].
///
/// Both fields are optional so loosely-shaped input (a hand-edited prompt
/// file, a model reply) can still be run; see [`PromptEntry::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    #[serde(default)]
    pub slide_number: Option<u32>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptEntry {
    pub fn new(slide_number: u32, prompt: impl Into<String>) -> Self {
        Self {
            slide_number: Some(slide_number),
            prompt: Some(prompt.into()),
        }
    }

    /// Slide number and prompt, with defaults for missing fields.
    ///
    /// The flag is true when either default was used.
    pub fn resolve(&self) -> (u32, &str, bool) {
        let defaulted = self.slide_number.is_none() || self.prompt.is_none();
        (
            self.slide_number.unwrap_or(DEFAULT_SLIDE_NUMBER),
            self.prompt.as_deref().unwrap_or(""),
            defaulted,
        )
    }
}

impl From<&NanoBananaPrompt> for PromptEntry {
    fn from(p: &NanoBananaPrompt) -> Self {
        Self::new(p.slide_number(), p.ensure_formatted())
    }
}

/// `slide_NN.ext`, with NN zero-padded to two digits.
pub fn slide_file_name(slide_number: u32, extension: &str) -> String {
    format!("slide_{slide_number:02}.{extension}")
}

/// File extension for an image MIME type.
pub fn mime_to_extension(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("jpeg") || mime.contains("jpg") {
        "jpg"
    } else if mime.contains("webp") {
        "webp"
    } else {
        "png"
    }
}

/// Create a fresh `YYYY-MM-DD_HHMMSS` directory under `root`.
pub fn create_run_directory(root: &Path) -> Result<PathBuf, DeckError> {
    std::fs::create_dir_all(root).map_err(|source| DeckError::OutputWriteFailed {
        path: root.to_path_buf(),
        source,
    })?;

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string();
    for attempt in 1..=MAX_RUN_DIR_SUFFIX {
        let name = if attempt == 1 {
            stamp.clone()
        } else {
            format!("{stamp}-{attempt}")
        };
        let dir = root.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => {
                debug!("Created run directory {}", dir.display());
                return Ok(dir);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(DeckError::OutputWriteFailed { path: dir, source }),
        }
    }
    Err(DeckError::Internal(format!(
        "no free run directory for {stamp} under {}",
        root.display()
    )))
}

/// Make sure an explicit output directory exists.
fn ensure_directory(dir: &Path) -> Result<PathBuf, DeckError> {
    std::fs::create_dir_all(dir).map_err(|source| DeckError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.to_path_buf())
}

/// Image saved by [`request_and_save`].
struct SavedImage {
    path: PathBuf,
    mime_type: String,
    dimensions: Option<(u32, u32)>,
}

/// Generate one slide image.
///
/// Without `output_dir` a fresh run directory under `config.output_root`
/// is created, but only once the model has returned image data. Never
/// fails: errors are reported through the result.
pub async fn generate_slide_image(
    model: &dyn ImageModel,
    prompt: &str,
    slide_number: u32,
    output_dir: Option<&Path>,
    config: &DeckConfig,
) -> GenerationResult {
    let target = match output_dir {
        Some(dir) => OutputTarget::Explicit(dir),
        None => OutputTarget::FreshRun(&config.output_root),
    };
    generate_one(model, prompt, slide_number, target, config)
        .await
        .0
}

/// Where a slide should be written.
enum OutputTarget<'a> {
    /// Created if missing; shared with other slides.
    Explicit(&'a Path),
    /// A new run directory under this root.
    FreshRun(&'a Path),
}

impl OutputTarget<'_> {
    fn resolve(&self) -> Result<PathBuf, DeckError> {
        match self {
            OutputTarget::Explicit(dir) => ensure_directory(dir),
            OutputTarget::FreshRun(root) => create_run_directory(root),
        }
    }
}

async fn generate_one(
    model: &dyn ImageModel,
    prompt: &str,
    slide_number: u32,
    target: OutputTarget<'_>,
    config: &DeckConfig,
) -> (GenerationResult, Option<SlideError>) {
    let start = Instant::now();
    let outcome = request_and_save(model, prompt, slide_number, &target, config).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(saved) => {
            let (width, height) = match saved.dimensions {
                Some((w, h)) => (Some(w), Some(h)),
                None => (None, None),
            };
            (
                GenerationResult {
                    slide_number,
                    success: true,
                    image_path: Some(saved.path),
                    error: None,
                    mime_type: Some(saved.mime_type),
                    width,
                    height,
                    duration_ms,
                },
                None,
            )
        }
        Err(e) => {
            warn!("Slide {} failed: {}", slide_number, e);
            let failure = SlideError::from_deck_error(slide_number, &e);
            (
                GenerationResult {
                    slide_number,
                    success: false,
                    image_path: None,
                    error: Some(e.to_string()),
                    mime_type: None,
                    width: None,
                    height: None,
                    duration_ms,
                },
                Some(failure),
            )
        }
    }
}

async fn request_and_save(
    model: &dyn ImageModel,
    prompt: &str,
    slide_number: u32,
    target: &OutputTarget<'_>,
    config: &DeckConfig,
) -> Result<SavedImage, DeckError> {
    let request = ImageRequestConfig::new(config.image_size);
    debug!(
        "Requesting slide {} ({} chars, {})",
        slide_number,
        prompt.len(),
        request.image_size
    );
    let response = model.generate(prompt, &request).await?;

    let inline = response.first_inline_image().ok_or(DeckError::NoImageData)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| DeckError::InvalidResponse {
            stage: crate::pipeline::Stage::Image,
            detail: format!("image data is not valid base64: {e}"),
        })?;

    let dir = target.resolve()?;
    let path = dir.join(slide_file_name(
        slide_number,
        mime_to_extension(&inline.mime_type),
    ));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|source| DeckError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;

    let dimensions = probe_dimensions(&bytes);
    match dimensions {
        Some((w, h)) => info!(
            "Saved slide {} ({}x{}, {} bytes) to {}",
            slide_number,
            w,
            h,
            bytes.len(),
            path.display()
        ),
        None => info!(
            "Saved slide {} ({} bytes) to {}",
            slide_number,
            bytes.len(),
            path.display()
        ),
    }

    Ok(SavedImage {
        path,
        mime_type: inline.mime_type.clone(),
        dimensions,
    })
}

/// Width and height from the image header, if it can be read.
fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Generate every slide in `entries`, in order, into one shared directory.
///
/// Without `output_dir` one fresh run directory is created up front for the
/// whole batch. Never fails: per-slide errors are collected in the result.
pub async fn generate_all_slides(
    model: &dyn ImageModel,
    entries: &[PromptEntry],
    output_dir: Option<&Path>,
    config: &DeckConfig,
) -> BatchGenerationResult {
    let dir = match output_dir {
        Some(d) => ensure_directory(d),
        None => create_run_directory(&config.output_root),
    };
    let dir = match dir {
        Ok(d) => d,
        Err(e) => return unwritable_batch(entries, output_dir, config, &e),
    };

    let total = entries.len();
    info!("Generating {} slide images into {}", total, dir.display());
    let mut batch = BatchGenerationResult::new(dir.clone());
    let cb = config.progress_callback.as_ref();

    for (index, entry) in entries.iter().enumerate() {
        let (slide_number, prompt, defaulted) = entry.resolve();
        if defaulted {
            warn!(
                "Prompt entry {} is missing {}; using slide {} with {}",
                index,
                missing_fields(entry),
                slide_number,
                if prompt.is_empty() { "an empty prompt" } else { "its prompt" }
            );
            batch.defaults_applied.push(index);
        }

        if let Some(cb) = cb {
            cb.on_slide_start(slide_number, total);
        }

        let (result, failure) = generate_one(
            model,
            prompt,
            slide_number,
            OutputTarget::Explicit(&dir),
            config,
        )
        .await;

        if let Some(cb) = cb {
            match (&result.image_path, &result.error) {
                (Some(path), _) => cb.on_slide_complete(slide_number, total, path),
                (None, Some(err)) => cb.on_slide_error(slide_number, total, err),
                (None, None) => {}
            }
        }
        batch.record(result, failure);
    }

    info!(
        "Image stage finished: {}/{} slides saved",
        batch.succeeded(),
        batch.attempted()
    );
    if let Some(cb) = cb {
        cb.on_images_complete(batch.attempted(), batch.succeeded());
    }
    batch
}

fn missing_fields(entry: &PromptEntry) -> &'static str {
    match (entry.slide_number.is_none(), entry.prompt.is_none()) {
        (true, true) => "slide_number and prompt",
        (true, false) => "slide_number",
        _ => "prompt",
    }
}

/// Batch result for a directory that could not be created: every slide
/// fails with the same write error.
fn unwritable_batch(
    entries: &[PromptEntry],
    output_dir: Option<&Path>,
    config: &DeckConfig,
    err: &DeckError,
) -> BatchGenerationResult {
    warn!("Cannot prepare output directory: {}", err);
    let dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_root.clone());
    let mut batch = BatchGenerationResult::new(dir);
    for (index, entry) in entries.iter().enumerate() {
        let (slide_number, _, defaulted) = entry.resolve();
        if defaulted {
            batch.defaults_applied.push(index);
        }
        let result = GenerationResult {
            slide_number,
            success: false,
            image_path: None,
            error: Some(err.to_string()),
            mime_type: None,
            width: None,
            height: None,
            duration_ms: 0,
        };
        batch.record(result, Some(SlideError::from_deck_error(slide_number, err)));
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::image_model::{GenerateContentResponse, Part};
    use async_trait::async_trait;

    /// 1x1 transparent PNG.
    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    struct FixedModel(GenerateContentResponse);

    #[async_trait]
    impl ImageModel for FixedModel {
        async fn generate(
            &self,
            _prompt: &str,
            _config: &ImageRequestConfig,
        ) -> Result<GenerateContentResponse, DeckError> {
            Ok(self.0.clone())
        }
    }

    fn config_with_root(root: &Path) -> DeckConfig {
        DeckConfig::builder().output_root(root).build().unwrap()
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(slide_file_name(1, "png"), "slide_01.png");
        assert_eq!(slide_file_name(9, "jpg"), "slide_09.jpg");
        assert_eq!(slide_file_name(12, "webp"), "slide_12.webp");
    }

    #[test]
    fn mime_mapping() {
        assert_eq!(mime_to_extension("image/jpeg"), "jpg");
        assert_eq!(mime_to_extension("image/JPG"), "jpg");
        assert_eq!(mime_to_extension("image/webp"), "webp");
        assert_eq!(mime_to_extension("image/png"), "png");
        assert_eq!(mime_to_extension("application/octet-stream"), "png");
    }

    #[test]
    fn run_directories_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = create_run_directory(root.path()).unwrap();
        let b = create_run_directory(root.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn entry_defaults() {
        let e: PromptEntry = serde_json::from_str("{}").unwrap();
        assert_eq!(e.resolve(), (1, "", true));
        let e = PromptEntry::new(4, "x");
        assert_eq!(e.resolve(), (4, "x", false));
    }

    #[test]
    fn entry_from_prompt_is_formatted_once() {
        let p = NanoBananaPrompt::new(3, "A dashboard on navy.").unwrap();
        let entry = PromptEntry::from(&p);
        let again = PromptEntry::from(&NanoBananaPrompt::new(3, entry.prompt.clone().unwrap()).unwrap());
        assert_eq!(entry.prompt, again.prompt);
        assert!(entry.prompt.unwrap().ends_with("clear text rendering."));
    }

    #[tokio::test]
    async fn single_slide_written_with_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let model = FixedModel(GenerateContentResponse::with_parts(vec![Part::inline(
            "image/png", PNG_1X1,
        )]));
        let cfg = DeckConfig::default();
        let r = generate_slide_image(&model, "p", 2, Some(dir.path()), &cfg).await;
        assert!(r.success, "error: {:?}", r.error);
        assert_eq!(r.image_path, Some(dir.path().join("slide_02.png")));
        assert_eq!((r.width, r.height), (Some(1), Some(1)));
    }

    #[tokio::test]
    async fn undecodable_image_still_saved_without_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let model = FixedModel(GenerateContentResponse::with_parts(vec![Part::inline(
            "image/jpeg",
            "AAAA",
        )]));
        let r = generate_slide_image(&model, "p", 1, Some(dir.path()), &DeckConfig::default()).await;
        assert!(r.success);
        assert_eq!(r.image_path, Some(dir.path().join("slide_01.jpg")));
        assert!(r.width.is_none());
    }

    #[tokio::test]
    async fn no_image_data_creates_no_directory() {
        let root = tempfile::tempdir().unwrap();
        let out_root = root.path().join("slides");
        let model = FixedModel(GenerateContentResponse::with_parts(vec![Part::text("sorry")]));
        let r = generate_slide_image(&model, "p", 1, None, &config_with_root(&out_root)).await;
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("No image data found in response"));
        assert!(r.image_path.is_none());
        assert!(!out_root.exists());
    }

    #[tokio::test]
    async fn bad_base64_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let model = FixedModel(GenerateContentResponse::with_parts(vec![Part::inline(
            "image/png",
            "!!not base64!!",
        )]));
        let r = generate_slide_image(&model, "p", 1, Some(dir.path()), &DeckConfig::default()).await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("base64"));
        assert!(!dir.path().join("slide_01.png").exists());
    }
}
