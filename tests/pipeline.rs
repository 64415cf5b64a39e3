//! Pipeline integration tests with scripted models.
//!
//! No network: the text and image models are replaced by fakes that replay
//! canned replies, and every run writes into a `tempfile` directory.

use async_trait::async_trait;
use base64::Engine;
use pitchdeck::pipeline::image_model::{GenerateContentResponse, ImageRequestConfig, Part};
use pitchdeck::prompts::PROMPT_SPEC_SUFFIX;
use pitchdeck::{
    generate_all_slides, generate_slide_image, DeckConfig, DeckError, ImageModel, Pipeline,
    PipelineProgressCallback, PromptEntry, Stage, TextModel,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Text model that always answers with the same reply.
struct ScriptedText {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedText {
    fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for ScriptedText {
    async fn complete(&self, _stage: Stage, _system: &str, _user: &str) -> Result<String, DeckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

#[derive(Clone)]
enum Reply {
    Image(&'static str, Vec<u8>),
    NoImage,
    HttpError(u16),
}

/// Image model that replays one reply per call and records the prompts.
struct ScriptedImages {
    replies: Vec<Reply>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedImages {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn always(reply: Reply) -> Arc<Self> {
        Self::new(vec![reply; 16])
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageModel for ScriptedImages {
    async fn generate(
        &self,
        prompt: &str,
        config: &ImageRequestConfig,
    ) -> Result<GenerateContentResponse, DeckError> {
        assert_eq!(config.aspect_ratio, "16:9");
        let index = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };
        match self.replies[index].clone() {
            Reply::Image(mime, bytes) => Ok(GenerateContentResponse::with_parts(vec![
                Part::text("Here is the slide."),
                Part::inline(mime, base64::engine::general_purpose::STANDARD.encode(bytes)),
            ])),
            Reply::NoImage => Ok(GenerateContentResponse::with_parts(vec![Part::text(
                "I can't draw that.",
            )])),
            Reply::HttpError(status) => Err(DeckError::ImageApiError {
                status,
                message: "backend unavailable".into(),
            }),
        }
    }
}

/// Records every progress event as a short string.
#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl RecordingCallback {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineProgressCallback for RecordingCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start:{stage}"));
    }
    fn on_stage_complete(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("done:{stage}"));
    }
    fn on_slide_complete(&self, slide_number: u32, _total: usize, _path: &Path) {
        self.events.lock().unwrap().push(format!("slide:{slide_number}"));
    }
    fn on_slide_error(&self, slide_number: u32, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("error:{slide_number}"));
    }
    fn on_images_complete(&self, total: usize, succeeded: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("images:{succeeded}/{total}"));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn png(marker: u8) -> Reply {
    // Not a decodable image; only the bytes matter here
    Reply::Image("image/png", vec![0x89, b'P', b'N', b'G', marker])
}

fn plan_reply(numbers: &[u32]) -> String {
    let slides: Vec<String> = numbers
        .iter()
        .map(|n| {
            format!(
                r#"{{"slide_number": {n}, "title": "Beat {n}", "body_content": ["point"], "visual_concept": "icon {n}"}}"#
            )
        })
        .collect();
    format!(
        "```json\n{{\"slides\": [{}], \"offer_summary\": \"Managed SEO for dentists\"}}\n```",
        slides.join(",")
    )
}

fn prompts_reply(numbers: &[u32]) -> String {
    let prompts: Vec<String> = numbers
        .iter()
        .map(|n| format!(r#"{{"slide_number": {n}, "prompt": "Slide {n}: navy gradient, bold title."}}"#))
        .collect();
    format!(r#"{{"prompts": [{}]}}"#, prompts.join(","))
}

fn entries(count: u32) -> Vec<PromptEntry> {
    (1..=count)
        .map(|n| PromptEntry::new(n, format!("prompt {n}")))
        .collect()
}

fn config_in(dir: &Path) -> DeckConfig {
    DeckConfig::builder().output_dir(dir).build().unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Image stage ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_continues_past_failed_slide() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedImages::new(vec![png(1), Reply::HttpError(503), png(3)]);

    let batch = generate_all_slides(model.as_ref(), &entries(3), Some(dir.path()), &config_in(dir.path())).await;

    assert!(!batch.success);
    assert_eq!(model.calls(), 3);
    assert_eq!(batch.attempted(), 3);
    assert_eq!(batch.images.len(), 2);
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors[0].starts_with("Slide 2: "), "got: {}", batch.errors[0]);
    assert!(batch.errors[0].contains("503"));
    assert_eq!(files_in(dir.path()), vec!["slide_01.png", "slide_03.png"]);
    assert_eq!(batch.output_directory, dir.path());
}

#[tokio::test]
async fn rerun_overwrites_existing_slide() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());

    let first = ScriptedImages::always(png(1));
    let r = generate_slide_image(first.as_ref(), "p", 4, Some(dir.path()), &cfg).await;
    assert!(r.success);

    let second = ScriptedImages::always(png(2));
    let r = generate_slide_image(second.as_ref(), "p", 4, Some(dir.path()), &cfg).await;
    assert!(r.success);

    let path = dir.path().join("slide_04.png");
    assert_eq!(r.image_path.as_deref(), Some(path.as_path()));
    assert_eq!(std::fs::read(&path).unwrap(), vec![0x89, b'P', b'N', b'G', 2]);
    assert_eq!(files_in(dir.path()), vec!["slide_04.png"]);
}

#[tokio::test]
async fn batch_rerun_overwrites_in_shared_directory() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());

    let first = ScriptedImages::always(png(1));
    let batch = generate_all_slides(first.as_ref(), &entries(2), Some(dir.path()), &cfg).await;
    assert!(batch.success);
    let first_paths = batch.images.clone();

    let second = ScriptedImages::always(png(2));
    let batch = generate_all_slides(second.as_ref(), &entries(2), Some(dir.path()), &cfg).await;
    assert!(batch.success);

    assert_eq!(batch.images, first_paths);
    assert_eq!(batch.output_directory, dir.path());
    assert_eq!(files_in(dir.path()), vec!["slide_01.png", "slide_02.png"]);
    for path in &batch.images {
        assert_eq!(std::fs::read(path).unwrap(), vec![0x89, b'P', b'N', b'G', 2]);
    }
}

#[tokio::test]
async fn jpeg_reply_gets_jpg_extension() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedImages::always(Reply::Image("image/jpeg", vec![0xff, 0xd8, 0xff]));
    let r = generate_slide_image(model.as_ref(), "p", 7, Some(dir.path()), &config_in(dir.path())).await;
    assert_eq!(r.image_path, Some(dir.path().join("slide_07.jpg")));
    assert_eq!(r.mime_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn no_image_data_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedImages::always(Reply::NoImage);

    let batch = generate_all_slides(model.as_ref(), &entries(1), Some(dir.path()), &config_in(dir.path())).await;

    assert!(!batch.success);
    assert!(batch.images.is_empty());
    assert_eq!(batch.errors, vec!["Slide 1: No image data found in response"]);
    assert!(files_in(dir.path()).is_empty());
    // Not retried
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn missing_fields_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedImages::always(png(0));
    let loose: Vec<PromptEntry> =
        serde_json::from_str(r#"[{}, {"slide_number": 3}, {"prompt": "hello"}, {"slide_number": 5, "prompt": "full"}]"#)
            .unwrap();

    let batch = generate_all_slides(model.as_ref(), &loose, Some(dir.path()), &config_in(dir.path())).await;

    assert_eq!(batch.defaults_applied, vec![0, 1, 2]);
    let numbers: Vec<u32> = batch.slides.iter().map(|s| s.slide_number).collect();
    assert_eq!(numbers, vec![1, 3, 1, 5]);
    assert_eq!(model.prompts(), vec!["", "", "hello", "full"]);
    assert!(batch.success);
}

#[tokio::test]
async fn default_directories_are_distinct() {
    let root = tempfile::tempdir().unwrap();
    let cfg = DeckConfig::builder().output_root(root.path()).build().unwrap();
    let model = ScriptedImages::always(png(0));

    let a = generate_all_slides(model.as_ref(), &entries(1), None, &cfg).await;
    let b = generate_all_slides(model.as_ref(), &entries(1), None, &cfg).await;

    assert_ne!(a.output_directory, b.output_directory);
    assert!(a.output_directory.starts_with(root.path()));
    assert!(a.images[0].starts_with(&a.output_directory));
    assert!(b.images[0].starts_with(&b.output_directory));
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_produces_every_slide() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(RecordingCallback::default());
    let cfg = DeckConfig::builder()
        .output_dir(dir.path())
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let numbers = [1, 2, 3, 4, 5, 6, 7];
    let planner = ScriptedText::new(plan_reply(&numbers));
    let composer = ScriptedText::new(prompts_reply(&numbers));
    let images = ScriptedImages::always(png(9));
    let pipeline = Pipeline::new(planner.clone(), composer.clone(), images.clone(), cfg);

    let output = pipeline
        .run("We run managed SEO for dental practices.")
        .await
        .unwrap();

    assert_eq!(output.deck_plan.len(), 7);
    assert_eq!(output.visual_prompts.len(), 7);
    assert!(output.generated_images.success);
    assert_eq!(output.stats.slides_planned, 7);
    assert_eq!(output.stats.images_succeeded, 7);
    assert_eq!(output.stats.images_failed, 0);
    assert_eq!(files_in(dir.path()).len(), 7);

    for prompt in images.prompts() {
        assert_eq!(prompt.matches(PROMPT_SPEC_SUFFIX).count(), 1, "prompt: {prompt}");
        assert!(prompt.starts_with("Slide "));
    }

    let events = events.events();
    assert_eq!(events.first().map(String::as_str), Some("start:plan"));
    assert_eq!(events.last().map(String::as_str), Some("done:image"));
    assert!(events.contains(&"images:7/7".to_string()));
    let plan_done = events.iter().position(|e| e == "done:plan").unwrap();
    let prompt_start = events.iter().position(|e| e == "start:prompt").unwrap();
    assert!(plan_done < prompt_start);

    assert!(output.into_result().is_ok());
}

#[tokio::test]
async fn partial_image_failure_does_not_fail_run() {
    let dir = tempfile::tempdir().unwrap();
    let numbers = [1, 2, 3, 4, 5, 6];
    let mut replies = vec![png(0); 6];
    replies[4] = Reply::NoImage;
    let pipeline = Pipeline::new(
        ScriptedText::new(plan_reply(&numbers)),
        ScriptedText::new(prompts_reply(&numbers)),
        ScriptedImages::new(replies),
        config_in(dir.path()),
    );

    let output = pipeline.run("offer").await.unwrap();
    assert_eq!(output.stats.images_succeeded, 5);
    assert_eq!(output.stats.images_failed, 1);
    assert!(output.summary().contains("Slide 5: No image data found in response"));

    let err = output.into_result().unwrap_err();
    assert!(matches!(err, DeckError::PartialFailure { failed: 1, total: 6, .. }));
}

#[tokio::test]
async fn invalid_plan_halts_before_prompt_stage() {
    let dir = tempfile::tempdir().unwrap();
    let planner = ScriptedText::new(plan_reply(&[1, 2, 3, 4, 5]));
    let composer = ScriptedText::new(prompts_reply(&[1, 2, 3, 4, 5, 6]));
    let images = ScriptedImages::always(png(0));
    let pipeline = Pipeline::new(planner, composer.clone(), images.clone(), config_in(dir.path()));

    let err = pipeline.run("offer").await.unwrap_err();

    match err {
        DeckError::StageFailed { stage, source } => {
            assert_eq!(stage, Stage::Plan);
            assert!(matches!(*source, DeckError::SchemaViolation { entity: "DeckPlan", .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(composer.calls(), 0);
    assert_eq!(images.calls(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn duplicate_slide_numbers_halt_plan_stage() {
    let dir = tempfile::tempdir().unwrap();
    let composer = ScriptedText::new(prompts_reply(&[1, 2, 3, 4, 5, 6]));
    let pipeline = Pipeline::new(
        ScriptedText::new(plan_reply(&[1, 2, 3, 3, 5, 6])),
        composer.clone(),
        ScriptedImages::always(png(0)),
        config_in(dir.path()),
    );

    let err = pipeline.run("offer").await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Plan));
    assert!(err.to_string().contains("slide number 3"), "got: {err}");
    assert_eq!(composer.calls(), 0);
}

#[tokio::test]
async fn prompt_set_must_cover_plan() {
    let dir = tempfile::tempdir().unwrap();
    let images = ScriptedImages::always(png(0));
    let pipeline = Pipeline::new(
        ScriptedText::new(plan_reply(&[1, 2, 3, 4, 5, 6])),
        ScriptedText::new(prompts_reply(&[1, 2, 3, 4, 5, 6, 7])),
        images.clone(),
        config_in(dir.path()),
    );

    let err = pipeline.run("offer").await.unwrap_err();

    match err {
        DeckError::StageFailed { stage, source } => {
            assert_eq!(stage, Stage::Prompt);
            match *source {
                DeckError::SlideMismatch { expected, found } => {
                    assert_eq!(expected, vec![1, 2, 3, 4, 5, 6]);
                    assert_eq!(found, vec![1, 2, 3, 4, 5, 6, 7]);
                }
                other => panic!("unexpected source: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(images.calls(), 0);
}

#[tokio::test]
async fn empty_offer_is_rejected_before_any_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let planner = ScriptedText::new(plan_reply(&[1, 2, 3, 4, 5, 6]));
    let pipeline = Pipeline::new(
        planner.clone(),
        ScriptedText::new(prompts_reply(&[1, 2, 3, 4, 5, 6])),
        ScriptedImages::always(png(0)),
        config_in(dir.path()),
    );

    let err = pipeline.run("   \n").await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Plan));
    assert_eq!(planner.calls(), 0);
}
