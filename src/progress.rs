//! Progress-callback trait for stage and per-slide pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::DeckConfigBuilder::progress_callback`] to follow a run
//! as it moves from planning to prompts to images.
//!
//! # Example
//!
//! ```rust
//! use pitchdeck::{DeckConfig, PipelineProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide_number: u32, total: usize, path: &Path) {
//!         let done = self.saved.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("slide {slide_number} ({done}/{total}) → {}", path.display());
//!     }
//! }
//!
//! let config = DeckConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::Stage;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive in order from a single task; the
/// `Send + Sync` bound lets the callback live inside a shared config.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced a valid output.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before the image request for a slide is sent.
    ///
    /// # Arguments
    /// * `slide_number` — the slide's number in the deck
    /// * `total`        — number of slides in this batch
    fn on_slide_start(&self, slide_number: u32, total: usize) {
        let _ = (slide_number, total);
    }

    /// Called when a slide image was saved.
    fn on_slide_complete(&self, slide_number: u32, total: usize, path: &Path) {
        let _ = (slide_number, total, path);
    }

    /// Called when a slide could not be produced.
    fn on_slide_error(&self, slide_number: u32, total: usize, error: &str) {
        let _ = (slide_number, total, error);
    }

    /// Called once after every slide has been attempted.
    ///
    /// # Arguments
    /// * `total`     — slides attempted
    /// * `succeeded` — slides saved without error
    fn on_images_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DeckConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
