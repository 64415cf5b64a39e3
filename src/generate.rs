//! Top-level entry points: offer document in, slide images out.
//!
//! [`Pipeline`] owns the three models and runs the stages in their fixed
//! order, handing each stage's output directly to the next. The free
//! functions below resolve models from a [`DeckConfig`] and cover the
//! common shapes of a run: the whole deck, planning only, or image
//! generation from a saved prompt set.

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::output::{BatchGenerationResult, PipelineOutput, PipelineStats};
use crate::pipeline::image_model::{GeminiImageModel, ImageModel};
use crate::pipeline::imagegen::{self, PromptEntry};
use crate::pipeline::text_model::{self, TextModel};
use crate::pipeline::{check_plan_transition, check_prompt_transition, composer, document, planner, Stage};
use crate::schema::{DeckPlan, VisualPromptSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// The three-stage deck pipeline bound to concrete models.
pub struct Pipeline {
    planner: Arc<dyn TextModel>,
    composer: Arc<dyn TextModel>,
    images: Arc<dyn ImageModel>,
    config: DeckConfig,
}

impl Pipeline {
    pub fn new(
        planner: Arc<dyn TextModel>,
        composer: Arc<dyn TextModel>,
        images: Arc<dyn ImageModel>,
        config: DeckConfig,
    ) -> Self {
        Self {
            planner,
            composer,
            images,
            config,
        }
    }

    /// Resolve every model from `config`.
    ///
    /// Fails when no text provider can be found or the image API key is
    /// missing, before any stage runs.
    pub fn from_config(config: &DeckConfig) -> Result<Self, DeckError> {
        let (planner, composer) = text_model::resolve_text_models(config)?;
        let images: Arc<dyn ImageModel> = Arc::new(GeminiImageModel::from_config(config)?);
        Ok(Self::new(planner, composer, images, config.clone()))
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Run all three stages on `offer_text`.
    ///
    /// # Returns
    /// `Ok(PipelineOutput)` once the image stage has run, even if some
    /// slides failed (check `output.generated_images.errors`).
    ///
    /// # Errors
    /// Any plan or prompt stage failure, wrapped in
    /// [`DeckError::StageFailed`]. Later stages are not run.
    pub async fn run(&self, offer_text: &str) -> Result<PipelineOutput, DeckError> {
        let total_start = Instant::now();
        let mut stats = PipelineStats {
            offer_chars: offer_text.chars().count(),
            ..Default::default()
        };
        info!("Starting deck run ({} chars of offer text)", stats.offer_chars);

        // ── Stage 1: Plan ────────────────────────────────────────────────
        let stage_start = self.enter(Stage::Plan);
        let deck_plan = self.plan(offer_text).await?;
        stats.plan_duration_ms = stage_start.elapsed().as_millis() as u64;
        stats.slides_planned = deck_plan.len();
        self.leave(Stage::Plan);

        // ── Stage 2: Prompt ──────────────────────────────────────────────
        let stage_start = self.enter(Stage::Prompt);
        let visual_prompts = self.compose(&deck_plan).await?;
        stats.prompt_duration_ms = stage_start.elapsed().as_millis() as u64;
        self.leave(Stage::Prompt);

        // ── Stage 3: Image ───────────────────────────────────────────────
        let stage_start = self.enter(Stage::Image);
        let generated_images = self.render(&visual_prompts).await;
        stats.image_duration_ms = stage_start.elapsed().as_millis() as u64;
        stats.images_succeeded = generated_images.succeeded();
        stats.images_failed = generated_images.failed();
        self.leave(Stage::Image);

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Deck run complete: {} slides planned, {}/{} images in {}ms",
            stats.slides_planned,
            stats.images_succeeded,
            generated_images.attempted(),
            stats.total_duration_ms
        );

        Ok(PipelineOutput {
            deck_plan,
            visual_prompts,
            generated_images,
            stats,
        })
    }

    /// Stage 1 plus the `Plan → Prompt` check.
    pub async fn plan(&self, offer_text: &str) -> Result<DeckPlan, DeckError> {
        let plan = planner::plan_deck(self.planner.as_ref(), offer_text, &self.config)
            .await
            .map_err(|e| e.in_stage(Stage::Plan))?;
        check_plan_transition(&plan).map_err(|e| e.in_stage(Stage::Plan))?;
        Ok(plan)
    }

    /// Stage 2 plus the `Prompt → Image` check.
    pub async fn compose(&self, plan: &DeckPlan) -> Result<VisualPromptSet, DeckError> {
        let prompts = composer::compose_prompts(self.composer.as_ref(), plan, &self.config)
            .await
            .map_err(|e| e.in_stage(Stage::Prompt))?;
        check_prompt_transition(plan, &prompts).map_err(|e| e.in_stage(Stage::Prompt))?;
        Ok(prompts)
    }

    /// Stage 3. Each prompt gets the layout suffix exactly once.
    pub async fn render(&self, prompts: &VisualPromptSet) -> BatchGenerationResult {
        let entries: Vec<PromptEntry> = prompts.prompts().iter().map(PromptEntry::from).collect();
        self.render_entries(&entries).await
    }

    /// Stage 3 on loosely-shaped entries, sent as given.
    pub async fn render_entries(&self, entries: &[PromptEntry]) -> BatchGenerationResult {
        imagegen::generate_all_slides(
            self.images.as_ref(),
            entries,
            self.config.output_dir.as_deref(),
            &self.config,
        )
        .await
    }

    fn enter(&self, stage: Stage) -> Instant {
        info!("Entering {} stage", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
        Instant::now()
    }

    fn leave(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage);
        }
        if stage.next().is_terminal() {
            info!("Pipeline reached {} stage", stage.next());
        }
    }
}

/// Read the offer text from a `.docx`, `.txt` or `.md` file.
pub fn read_offer(input: impl AsRef<Path>) -> Result<String, DeckError> {
    let path = input.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("docx") => document::read_document_text(path),
        Some("txt") | Some("md") => document::read_plain_text(path),
        _ if !path.exists() => Err(DeckError::FileNotFound {
            path: path.to_path_buf(),
        }),
        _ => Err(DeckError::UnsupportedFormat {
            path: path.to_path_buf(),
            expected: ".docx, .txt or .md".to_string(),
        }),
    }
}

/// Generate a full deck from an offer document.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(DeckError)` only for fatal errors: unreadable input,
/// unconfigured models, or a failed plan/prompt stage. Failed slides are
/// reported in the output, not as an error.
pub async fn generate_deck(
    input: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<PipelineOutput, DeckError> {
    let input = input.as_ref();
    info!("Reading offer from {}", input.display());
    let offer_text = read_offer(input)?;
    generate_deck_from_text(&offer_text, config).await
}

/// Generate a full deck from offer text already in memory.
pub async fn generate_deck_from_text(
    offer_text: &str,
    config: &DeckConfig,
) -> Result<PipelineOutput, DeckError> {
    Pipeline::from_config(config)?.run(offer_text).await
}

/// Synchronous wrapper around [`generate_deck`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_deck_sync(
    input: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<PipelineOutput, DeckError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DeckError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_deck(input, config))
}

/// Run stage 1 only.
///
/// Does not require an image API key.
pub async fn plan_deck(
    input: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<DeckPlan, DeckError> {
    let offer_text = read_offer(input)?;
    plan_deck_from_text(&offer_text, config).await
}

/// Run stage 1 only on offer text already in memory.
pub async fn plan_deck_from_text(
    offer_text: &str,
    config: &DeckConfig,
) -> Result<DeckPlan, DeckError> {
    let (planner, _) = text_model::resolve_text_models(config)?;
    let plan = planner::plan_deck(planner.as_ref(), offer_text, config)
        .await
        .map_err(|e| e.in_stage(Stage::Plan))?;
    check_plan_transition(&plan).map_err(|e| e.in_stage(Stage::Plan))?;
    Ok(plan)
}

/// Run stage 3 only, from a saved prompt set.
///
/// Does not require a text provider.
pub async fn render_prompts(
    prompts: &VisualPromptSet,
    config: &DeckConfig,
) -> Result<BatchGenerationResult, DeckError> {
    let entries: Vec<PromptEntry> = prompts.prompts().iter().map(PromptEntry::from).collect();
    render_entries(&entries, config).await
}

/// Run stage 3 only on loosely-shaped entries, sent as given.
pub async fn render_entries(
    entries: &[PromptEntry],
    config: &DeckConfig,
) -> Result<BatchGenerationResult, DeckError> {
    let model = GeminiImageModel::from_config(config)?;
    Ok(imagegen::generate_all_slides(&model, entries, config.output_dir.as_deref(), config).await)
}

/// Write `value` as pretty JSON to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn save_json<T: serde::Serialize>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), DeckError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DeckError::Internal(format!("JSON serialisation failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DeckError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| DeckError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DeckError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(())
}
