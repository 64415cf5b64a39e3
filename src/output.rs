//! Result types returned by the tools and the pipeline.
//!
//! The tool-level results ([`ExtractionResult`], [`PdfConversionResult`],
//! [`GenerationResult`], [`BatchGenerationResult`]) share one shape:
//! a `success` flag, the produced value (if any) and an `error` string (if
//! any). They serialise to the same JSON an agent runtime would hand back
//! from a function tool, and they are never `Err`: every failure below the
//! tool boundary has already been turned into `error`.

use crate::error::{DeckError, SlideError};
use crate::schema::{DeckPlan, VisualPromptSet};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Outcome of [`crate::pipeline::document::extract_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    /// Paragraph text, then table rows under a `--- Tables ---` marker.
    pub text: Option<String>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub(crate) fn from_result(result: Result<String, DeckError>) -> Self {
        match result {
            Ok(text) => Self {
                success: true,
                text: Some(text),
                error: None,
            },
            Err(e) => Self {
                success: false,
                text: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Outcome of [`crate::pipeline::document::convert_to_pdf`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfConversionResult {
    pub success: bool,
    pub pdf_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl PdfConversionResult {
    pub(crate) fn from_result(result: Result<PathBuf, DeckError>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                pdf_path: Some(path),
                error: None,
            },
            Err(e) => Self {
                success: false,
                pdf_path: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Outcome of one [`crate::pipeline::imagegen::generate_slide_image`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Slide number the image was requested for.
    pub slide_number: u32,
    pub success: bool,
    /// Where the image was written (`<dir>/slide_NN.<ext>`).
    pub image_path: Option<PathBuf>,
    pub error: Option<String>,
    /// MIME type declared by the model for the saved image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Pixel dimensions, when the image header could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Wall-clock time for request + write.
    pub duration_ms: u64,
}

/// Outcome of [`crate::pipeline::imagegen::generate_all_slides`].
///
/// Partial success is the normal case: `images` holds every path that was
/// produced, `errors` one labelled message per slide that was not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGenerationResult {
    /// True only if every slide succeeded.
    pub success: bool,
    /// Saved image paths, in input order.
    pub images: Vec<PathBuf>,
    /// Directory shared by every slide of the batch.
    pub output_directory: PathBuf,
    /// `"Slide N: <error>"` for every failed slide, in input order.
    pub errors: Vec<String>,
    /// Per-slide results, in input order.
    pub slides: Vec<GenerationResult>,
    /// Structured form of `errors`.
    pub failures: Vec<SlideError>,
    /// Indices of input entries that were missing a slide number or a
    /// prompt and ran with the defaults instead.
    pub defaults_applied: Vec<usize>,
}

impl BatchGenerationResult {
    pub(crate) fn new(output_directory: PathBuf) -> Self {
        Self {
            success: true,
            images: Vec::new(),
            output_directory,
            errors: Vec::new(),
            slides: Vec::new(),
            failures: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    /// Fold one slide result into the batch.
    ///
    /// `failure` must be set exactly when `result.success` is false.
    pub(crate) fn record(&mut self, result: GenerationResult, failure: Option<SlideError>) {
        match failure {
            None => {
                if let Some(ref path) = result.image_path {
                    self.images.push(path.clone());
                }
            }
            Some(failure) => {
                self.success = false;
                self.errors.push(failure.to_string());
                self.failures.push(failure);
            }
        }
        self.slides.push(result);
    }

    pub fn attempted(&self) -> usize {
        self.slides.len()
    }

    pub fn succeeded(&self) -> usize {
        self.images.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Timing and count summary for a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Characters of offer text fed to the planner.
    pub offer_chars: usize,
    pub slides_planned: usize,
    pub images_succeeded: usize,
    pub images_failed: usize,
    pub plan_duration_ms: u64,
    pub prompt_duration_ms: u64,
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
///
/// Field names match the keys the stages were historically exchanged under
/// (`deck_plan`, `visual_prompts`, `generated_images`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub deck_plan: DeckPlan,
    pub visual_prompts: VisualPromptSet,
    pub generated_images: BatchGenerationResult,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// Treat any failed slide as an error.
    pub fn into_result(self) -> Result<Self, DeckError> {
        let failed = self.generated_images.failed();
        if failed == 0 {
            Ok(self)
        } else {
            Err(DeckError::PartialFailure {
                succeeded: self.generated_images.succeeded(),
                failed,
                total: self.generated_images.attempted(),
            })
        }
    }

    /// Human-readable report: counts, paths, then every failure message.
    pub fn summary(&self) -> String {
        let images = &self.generated_images;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Generated {}/{} slides ({} failed) in {}",
            images.succeeded(),
            images.attempted(),
            images.failed(),
            images.output_directory.display()
        );
        for path in &images.images {
            let _ = writeln!(out, "  {}", path.display());
        }
        if !images.errors.is_empty() {
            let _ = writeln!(out, "Errors:");
            for e in &images.errors {
                let _ = writeln!(out, "  {e}");
            }
        }
        out
    }
}
