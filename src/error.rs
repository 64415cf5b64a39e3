//! Error types for the pitchdeck library.
//!
//! Two error types mirror the two ways a deck run can go wrong:
//!
//! * [`DeckError`] — **Fatal**: the run cannot continue (offer document
//!   missing, planner reply failed schema validation, provider not
//!   configured). Returned as `Err(DeckError)` from the top-level entry
//!   points and halts the pipeline before the next stage.
//!
//! * [`SlideError`] — **Non-fatal**: one slide image could not be produced
//!   while the others were. Stored in [`crate::output::BatchGenerationResult`] so the
//!   batch keeps going and callers get every producible image.
//!
//! Tool-boundary functions ([`crate::pipeline::document::extract_text`],
//! [`crate::pipeline::imagegen::generate_slide_image`], …) never return these
//! directly: they render them into the `error` string of their result struct.

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pitchdeck library.
#[derive(Debug, Error)]
pub enum DeckError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{}'\nTry: chmod +r {path:?}", path.display())]
    PermissionDenied { path: PathBuf },

    /// The file extension is not one this operation accepts.
    #[error("Input file must be a {expected} file: '{}'", path.display())]
    UnsupportedFormat { path: PathBuf, expected: String },

    /// The file exists but is not a readable word-processor document.
    #[error("Invalid document '{}': {detail}", path.display())]
    InvalidDocument { path: PathBuf, detail: String },

    // ── External utility errors ───────────────────────────────────────────
    /// The external document converter could not be started.
    #[error("Document converter '{program}' is not available.\n{hint}")]
    ConverterUnavailable { program: String, hint: String },

    /// The converter ran but did not produce a PDF.
    #[error("PDF conversion of '{}' failed: {detail}", path.display())]
    ConversionFailed { path: PathBuf, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured text provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The text model API returned an error.
    #[error("LLM API error during {stage} stage: {message}")]
    LlmApiError { stage: Stage, message: String },

    /// The image-generation endpoint answered with a non-success status.
    #[error("Image API error (HTTP {status}): {message}")]
    ImageApiError { status: u16, message: String },

    /// The image model answered, but no candidate carried inline image data.
    #[error("No image data found in response")]
    NoImageData,

    /// The model reply could not be interpreted at all (empty, no JSON).
    #[error("Invalid model response during {stage} stage: {detail}")]
    InvalidResponse { stage: Stage, detail: String },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// A structured value failed its construction-time constraints.
    #[error("Invalid {entity}: {detail}")]
    SchemaViolation { entity: &'static str, detail: String },

    /// The deck plan uses the same slide number more than once.
    #[error("Deck plan uses slide number {slide_number} more than once")]
    DuplicateSlideNumber { slide_number: u32 },

    /// The prompt set does not cover exactly the slides of the deck plan.
    #[error("Visual prompts do not match the deck plan: expected slides {expected:?}, found {found:?}")]
    SlideMismatch { expected: Vec<u32>, found: Vec<u32> },

    /// Some slide images were produced but at least one failed.
    ///
    /// Returned by [`crate::output::PipelineOutput::into_result`] when the
    /// caller wants to treat any slide failure as an error.
    #[error("{failed}/{total} slides failed during image generation")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    /// A pipeline stage failed; later stages were not run.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<DeckError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a directory or write an output file.
    #[error("Failed to write '{}': {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeckError {
    /// Wrap this error with the stage it happened in.
    ///
    /// Errors already carrying a stage are returned unchanged so nesting
    /// never goes deeper than one level.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ DeckError::StageFailed { .. } => e,
            other => DeckError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DeckError::StageFailed { stage, .. }
            | DeckError::LlmApiError { stage, .. }
            | DeckError::InvalidResponse { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A non-fatal error for a single slide image.
///
/// Collected in [`crate::output::BatchGenerationResult::failures`] when
/// generation fails.
/// The batch continues with the remaining slides.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The model reply had no image-bearing part.
    #[error("Slide {slide}: No image data found in response")]
    NoImageData { slide: u32 },

    /// The request to the image model failed.
    #[error("Slide {slide}: {detail}")]
    GenerationFailed { slide: u32, detail: String },

    /// The image was produced but could not be saved.
    #[error("Slide {slide}: failed to save image: {detail}")]
    WriteFailed { slide: u32, detail: String },
}

impl SlideError {
    /// Classify a fatal error raised while producing one slide.
    pub fn from_deck_error(slide: u32, err: &DeckError) -> Self {
        match err {
            DeckError::NoImageData => SlideError::NoImageData { slide },
            DeckError::OutputWriteFailed { .. } | DeckError::Io(_) => SlideError::WriteFailed {
                slide,
                detail: err.to_string(),
            },
            other => SlideError::GenerationFailed {
                slide,
                detail: other.to_string(),
            },
        }
    }

    /// Slide number the failure belongs to.
    pub fn slide(&self) -> u32 {
        match self {
            SlideError::NoImageData { slide }
            | SlideError::GenerationFailed { slide, .. }
            | SlideError::WriteFailed { slide, .. } => *slide,
        }
    }
}
