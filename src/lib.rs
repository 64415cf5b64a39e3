//! # pitchdeck
//!
//! Turn a commercial offer document into a rendered pitch deck.
//!
//! ## Pipeline Overview
//!
//! ```text
//! offer.docx
//!  │
//!  ├─ 0. Extract  paragraphs + table rows from word/document.xml
//!  ├─ 1. Plan     strategist model → DeckPlan (6–9 slides, fixed narrative)
//!  ├─ 2. Prompt   art-director model → VisualPromptSet (one prompt per slide)
//!  └─ 3. Image    image model, one slide at a time → slide_NN.png
//! ```
//!
//! Stages run strictly in that order. A plan or prompt failure stops the
//! run; a failed slide image does not, and is reported next to the slides
//! that were produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitchdeck::{generate_deck, DeckConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Text provider auto-detected; images need GEMINI_API_KEY
//!     let config = DeckConfig::default();
//!     let output = generate_deck("offer.docx", &config).await?;
//!     print!("{}", output.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Standalone tools
//!
//! | Function | Needs | Result |
//! |----------|-------|--------|
//! | [`extract_text`] | nothing | [`ExtractionResult`] |
//! | [`convert_to_pdf`] | LibreOffice (`soffice`) | [`PdfConversionResult`] |
//! | [`generate_slide_image`] | image API key | [`GenerationResult`] |
//! | [`generate_all_slides`] | image API key | [`BatchGenerationResult`] |
//!
//! Tools never return `Err`; every failure lands in the result's `error`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pitchdeck` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DeckConfig, DeckConfigBuilder, ImageSize};
pub use error::{DeckError, SlideError};
pub use generate::{
    generate_deck, generate_deck_from_text, generate_deck_sync, plan_deck, plan_deck_from_text,
    read_offer, render_entries, render_prompts, save_json, Pipeline,
};
pub use output::{
    BatchGenerationResult, ExtractionResult, GenerationResult, PdfConversionResult, PipelineOutput,
    PipelineStats,
};
pub use pipeline::document::{convert_to_pdf, convert_to_pdf_with, extract_text};
pub use pipeline::image_model::{GeminiImageModel, ImageModel};
pub use pipeline::imagegen::{generate_all_slides, generate_slide_image, PromptEntry};
pub use pipeline::text_model::{LlmTextModel, TextModel};
pub use pipeline::Stage;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use schema::{DeckPlan, NanoBananaPrompt, SlidePlan, VisualPromptSet};
