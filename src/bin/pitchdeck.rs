//! CLI binary for pitchdeck.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DeckConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use pitchdeck::{
    convert_to_pdf_with, extract_text, generate_deck_from_text, plan_deck_from_text, read_offer,
    render_entries, render_prompts, save_json, BatchGenerationResult, DeckConfig, ImageSize,
    PipelineProgressCallback, ProgressCallback, PromptEntry, Stage, VisualPromptSet,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the text stages run, then a
/// slide counter bar during image generation.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<u32, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading offer…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the counter style once the slide count is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    /// Remove the bar from the terminal if it is still drawing.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn elapsed_secs(&self, slide_number: u32) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&slide_number)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let (prefix, msg) = match stage {
            Stage::Plan => ("Planning", "Strategist is outlining the deck…"),
            Stage::Prompt => ("Composing", "Art director is writing slide prompts…"),
            Stage::Image => ("Rendering", "Starting image generation…"),
            Stage::Done => return,
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage) {
        if stage != Stage::Image {
            self.bar
                .println(format!("{} {} stage complete", cyan("◆"), bold(&stage.to_string())));
        }
    }

    fn on_slide_start(&self, slide_number: u32, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.activate_bar(total);
        }
        self.start_times
            .lock()
            .unwrap()
            .insert(slide_number, Instant::now());
        self.bar.set_message(format!("slide {slide_number}"));
    }

    fn on_slide_complete(&self, slide_number: u32, total: usize, path: &Path) {
        let secs = self.elapsed_secs(slide_number);
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}  {}",
            green("✓"),
            slide_number,
            total,
            dim(&path.display().to_string()),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide_number: u32, total: usize, error: &str) {
        let secs = self.elapsed_secs(slide_number);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(79) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}  {}",
            red("✗"),
            slide_number,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_images_complete(&self, _total: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: offer document → slides in public/slides/<timestamp>/
  pitchdeck offer.docx

  # Write slides into a fixed directory and keep the run state
  pitchdeck offer.docx -o out/deck --state-out out/deck/run.json

  # Plan only (no image API calls)
  pitchdeck --plan-only offer.docx > plan.json

  # Offer text on the command line instead of a file
  pitchdeck --text "We sell AI-powered bookkeeping to small agencies..."

  # Re-render images from a saved prompt set
  pitchdeck --prompts prompts.json -o out/deck

  # Document tools
  pitchdeck --extract-only offer.docx
  pitchdeck --to-pdf offer.docx
  pitchdeck --to-pdf out/offer.pdf offer.docx

STAGES:
  1. plan    strategist model writes a 6–9 slide outline (DeckPlan)
  2. prompt  art-director model writes one image prompt per slide
  3. image   image model renders each slide as slide_NN.png, one at a time

  A failed plan or prompt stage stops the run. A failed slide does not: the
  summary lists every produced image and every failure.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (text stages and images)
  GOOGLE_API_KEY          Fallback for GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key (text stages only)
  ANTHROPIC_API_KEY       Anthropic API key (text stages only)
  EDGEQUAKE_LLM_PROVIDER  Override text provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         With EDGEQUAKE_LLM_PROVIDER, one model for both text stages
  PITCHDECK_SOFFICE       LibreOffice binary used by --to-pdf
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Turn an offer document into a pitch deck of slide images.
#[derive(Parser, Debug)]
#[command(
    name = "pitchdeck",
    version,
    about = "Turn an offer document into a pitch deck of slide images",
    long_about = "Turn a commercial offer (.docx, .txt or .md) into a 6–9 slide pitch deck. \
A strategist model plans the narrative, an art-director model writes one image prompt per \
slide, and an image model renders every slide.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Offer document (.docx, .txt, .md), or the offer text itself with --text.
    /// Not needed with --prompts.
    #[arg(required_unless_present = "prompts")]
    input: Option<String>,

    /// Write every slide into this directory instead of a timestamped one.
    #[arg(short, long, env = "PITCHDECK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Parent directory for timestamped run directories.
    #[arg(long, env = "PITCHDECK_OUTPUT_ROOT", default_value = pitchdeck::config::DEFAULT_OUTPUT_ROOT)]
    output_root: PathBuf,

    /// Text provider for the plan and prompt stages: gemini, openai, anthropic, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for the plan stage.
    #[arg(long, env = "PITCHDECK_PLANNER_MODEL", default_value = pitchdeck::config::DEFAULT_PLANNER_MODEL)]
    planner_model: String,

    /// Model for the prompt stage.
    #[arg(long, env = "PITCHDECK_COMPOSER_MODEL", default_value = pitchdeck::config::DEFAULT_COMPOSER_MODEL)]
    composer_model: String,

    /// Image-generation model.
    #[arg(long, env = "PITCHDECK_IMAGE_MODEL", default_value = pitchdeck::config::DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// Image resolution tier: 1k, 2k, 4k.
    #[arg(long, env = "PITCHDECK_IMAGE_SIZE", value_enum, default_value = "2k")]
    image_size: ImageSizeArg,

    /// Sampling temperature for the text stages (0.0–2.0).
    #[arg(long, env = "PITCHDECK_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max output tokens per text-stage reply.
    #[arg(long, env = "PITCHDECK_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-request image API timeout in seconds (default: none).
    #[arg(long, env = "PITCHDECK_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Text file replacing the built-in strategist instruction.
    #[arg(long, env = "PITCHDECK_STRATEGIST_PROMPT")]
    strategist_prompt: Option<PathBuf>,

    /// Text file replacing the built-in art-director instruction.
    #[arg(long, env = "PITCHDECK_ART_DIRECTOR_PROMPT")]
    art_director_prompt: Option<PathBuf>,

    /// Treat INPUT as the offer text itself.
    #[arg(long)]
    text: bool,

    /// Stop after the plan stage and print the deck plan as JSON.
    #[arg(long, conflicts_with_all = ["extract_only", "to_pdf", "prompts"])]
    plan_only: bool,

    /// Print the document text and exit.
    #[arg(long, conflicts_with_all = ["to_pdf", "prompts", "text"])]
    extract_only: bool,

    /// Convert the .docx INPUT to PDF (optionally at PATH) and exit.
    #[arg(long, value_name = "PATH", num_args = 0..=1, conflicts_with_all = ["prompts", "text"])]
    to_pdf: Option<Option<PathBuf>>,

    /// Skip to the image stage using a saved prompt set (JSON).
    #[arg(long, value_name = "JSON")]
    prompts: Option<PathBuf>,

    /// Print structured JSON results on stdout.
    #[arg(long, env = "PITCHDECK_JSON")]
    json: bool,

    /// Write the full run state (plan, prompts, images, stats) to this file.
    #[arg(long, value_name = "FILE")]
    state_out: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PITCHDECK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PITCHDECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the final summary.
    #[arg(short, long, env = "PITCHDECK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ImageSizeArg {
    #[value(name = "1k", alias = "1K")]
    OneK,
    #[value(name = "2k", alias = "2K")]
    TwoK,
    #[value(name = "4k", alias = "4K")]
    FourK,
}

impl From<ImageSizeArg> for ImageSize {
    fn from(v: ImageSizeArg) -> Self {
        match v {
            ImageSizeArg::OneK => ImageSize::OneK,
            ImageSizeArg::TwoK => ImageSize::TwoK,
            ImageSizeArg::FourK => ImageSize::FourK,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let tool_mode = cli.extract_only || cli.to_pdf.is_some();
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !tool_mode;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);

    let result = match build_config(&cli, progress_cb).await {
        Ok(config) => run(&cli, &config, cli_progress.as_deref()).await,
        Err(e) => Err(e),
    };
    // Stage failures and plan-only runs never reach the image stage
    if let Some(ref cb) = cli_progress {
        cb.clear();
    }
    result
}

/// Run the selected mode. `progress` is the live bar, if any.
async fn run(cli: &Cli, config: &DeckConfig, progress: Option<&CliProgressCallback>) -> Result<()> {
    // ── Document tools ───────────────────────────────────────────────────
    if cli.extract_only {
        let input = required_input(cli)?;
        let result = extract_text(input);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if let Some(ref text) = result.text {
            println!("{text}");
        }
        if let Some(err) = result.error {
            anyhow::bail!("Text extraction failed: {err}");
        }
        return Ok(());
    }

    if let Some(ref target) = cli.to_pdf {
        let input = required_input(cli)?;
        let result = convert_to_pdf_with(input, target.as_deref(), &config.soffice_path).await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        match (result.pdf_path, result.error) {
            (Some(path), _) => {
                if !cli.quiet && !cli.json {
                    eprintln!("{}  PDF written to {}", green("✔"), bold(&path.display().to_string()));
                }
                return Ok(());
            }
            (None, err) => anyhow::bail!(
                "PDF conversion failed: {}",
                err.unwrap_or_else(|| "unknown error".into())
            ),
        }
    }

    // ── Image stage only ─────────────────────────────────────────────────
    if let Some(ref prompts_path) = cli.prompts {
        let batch = render_saved_prompts(prompts_path, config).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        if let Some(ref path) = cli.state_out {
            save_json(&batch, path).await.context("Failed to write run state")?;
        }
        print_batch_summary(&batch);
        return finish(&batch);
    }

    // ── Offer text ───────────────────────────────────────────────────────
    let input = required_input(cli)?;
    let offer_text = if cli.text {
        input.to_string()
    } else {
        read_offer(input).with_context(|| format!("Failed to read offer from '{input}'"))?
    };

    // ── Plan only ────────────────────────────────────────────────────────
    if cli.plan_only {
        let plan = plan_deck_from_text(&offer_text, config)
            .await
            .context("Planning failed")?;
        if let Some(cb) = progress {
            cb.clear();
        }
        println!("{}", serde_json::to_string_pretty(&plan)?);
        if let Some(ref path) = cli.state_out {
            save_json(&plan, path).await.context("Failed to write run state")?;
        }
        if !cli.quiet {
            eprintln!("{}  {} slides planned", green("✔"), bold(&plan.len().to_string()));
        }
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let output = generate_deck_from_text(&offer_text, config)
        .await
        .context("Deck generation failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    if let Some(ref path) = cli.state_out {
        save_json(&output, path)
            .await
            .context("Failed to write run state")?;
    }

    print_batch_summary(&output.generated_images);
    if !cli.quiet {
        eprintln!(
            "   {} slides planned  —  plan {}ms / prompts {}ms / images {}ms  —  {}ms total",
            output.stats.slides_planned,
            dim(&output.stats.plan_duration_ms.to_string()),
            dim(&output.stats.prompt_duration_ms.to_string()),
            dim(&output.stats.image_duration_ms.to_string()),
            output.stats.total_duration_ms,
        );
    }
    finish(&output.generated_images)
}

fn required_input(cli: &Cli) -> Result<&str> {
    cli.input
        .as_deref()
        .context("INPUT is required for this mode")
}

/// Load a saved prompt set and run the image stage on it.
///
/// A well-formed prompt set gets the layout suffix; anything else is read
/// as a list of loose `{slide_number, prompt}` entries and sent as given.
async fn render_saved_prompts(path: &Path, config: &DeckConfig) -> Result<BatchGenerationResult> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompts from {:?}", path))?;

    if let Ok(set) = serde_json::from_str::<VisualPromptSet>(&raw) {
        return render_prompts(&set, config)
            .await
            .context("Image generation failed");
    }

    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{:?} is not valid JSON", path))?;
    let list = match value {
        serde_json::Value::Object(mut obj) => obj
            .remove("prompts")
            .context("Expected a \"prompts\" array")?,
        other => other,
    };
    let entries: Vec<PromptEntry> =
        serde_json::from_value(list).context("Prompts must be a list of {slide_number, prompt}")?;
    render_entries(&entries, config)
        .await
        .context("Image generation failed")
}

/// Succeeded/failed counts, every saved path, every failure message.
fn print_batch_summary(batch: &BatchGenerationResult) {
    let failed = batch.failed();
    let attempted = batch.attempted();
    let mark = if failed == 0 {
        green("✔")
    } else if failed == attempted {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {}/{} slides generated  ({} failed)  →  {}",
        mark,
        bold(&batch.succeeded().to_string()),
        attempted,
        if failed == 0 {
            failed.to_string()
        } else {
            red(&failed.to_string())
        },
        bold(&batch.output_directory.display().to_string()),
    );
    for path in &batch.images {
        eprintln!("   {}", dim(&path.display().to_string()));
    }
    for error in &batch.errors {
        eprintln!("   {} {}", red("✗"), error);
    }
}

/// Non-zero exit when any slide failed.
fn finish(batch: &BatchGenerationResult) -> Result<()> {
    if batch.success {
        Ok(())
    } else {
        anyhow::bail!(
            "{}/{} slides failed during image generation",
            batch.failed(),
            batch.attempted()
        )
    }
}

/// Map CLI args to `DeckConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DeckConfig> {
    let mut builder = DeckConfig::builder()
        .planner_model(&cli.planner_model)
        .composer_model(&cli.composer_model)
        .image_model(&cli.image_model)
        .image_size(cli.image_size.clone().into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .output_root(&cli.output_root);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref path) = cli.strategist_prompt {
        builder = builder.strategist_prompt(read_prompt_file(path).await?);
    }
    if let Some(ref path) = cli.art_director_prompt {
        builder = builder.art_director_prompt(read_prompt_file(path).await?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read instruction from {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_is_cleared_without_image_stage() {
        let cb = CliProgressCallback::new();
        cb.on_stage_start(Stage::Plan);
        cb.on_stage_complete(Stage::Plan);
        assert!(!cb.bar.is_finished());

        cb.clear();
        assert!(cb.bar.is_finished());
        // Second clear is a no-op
        cb.clear();
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn plan_only_is_parsed() {
        let cli = Cli::try_parse_from(["pitchdeck", "offer.docx", "--plan-only"]).unwrap();
        assert!(cli.plan_only);
        assert_eq!(cli.input.as_deref(), Some("offer.docx"));
    }
}
