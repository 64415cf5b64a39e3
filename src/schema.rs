//! Structured values handed from one pipeline stage to the next.
//!
//! The strategist produces a [`DeckPlan`], the art director a
//! [`VisualPromptSet`]. Both arrive as JSON written by a language model, so
//! every type validates itself on construction *and* on deserialisation
//! (`#[serde(try_from = …)]`): a value that exists is a value that satisfies
//! its bounds. Fields are private and exposed through accessors, so nothing
//! downstream can mutate a validated value back into an invalid one.

use crate::error::DeckError;
use crate::prompts::PROMPT_SPEC_SUFFIX;
use serde::{Deserialize, Serialize};

/// Lowest slide number a plan or prompt may use.
pub const MIN_SLIDE_NUMBER: u32 = 1;
/// Highest slide number a plan or prompt may use.
pub const MAX_SLIDE_NUMBER: u32 = 9;
/// Fewest slides a deck may have.
pub const MIN_SLIDES: usize = 6;
/// Most slides a deck may have.
pub const MAX_SLIDES: usize = 9;

fn check_slide_number(entity: &'static str, n: u32) -> Result<(), DeckError> {
    if (MIN_SLIDE_NUMBER..=MAX_SLIDE_NUMBER).contains(&n) {
        Ok(())
    } else {
        Err(DeckError::SchemaViolation {
            entity,
            detail: format!(
                "slide_number must be {MIN_SLIDE_NUMBER}-{MAX_SLIDE_NUMBER}, got {n}"
            ),
        })
    }
}

fn check_count(entity: &'static str, what: &str, n: usize) -> Result<(), DeckError> {
    if (MIN_SLIDES..=MAX_SLIDES).contains(&n) {
        Ok(())
    } else {
        Err(DeckError::SchemaViolation {
            entity,
            detail: format!("expected {MIN_SLIDES}-{MAX_SLIDES} {what}, got {n}"),
        })
    }
}

fn check_non_empty(entity: &'static str, field: &str, value: &str) -> Result<(), DeckError> {
    if value.trim().is_empty() {
        Err(DeckError::SchemaViolation {
            entity,
            detail: format!("{field} must not be empty"),
        })
    } else {
        Ok(())
    }
}

// ── SlidePlan ────────────────────────────────────────────────────────────

/// One slide of the deck as planned by the strategist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlidePlan")]
pub struct SlidePlan {
    slide_number: u32,
    title: String,
    body_content: Vec<String>,
    visual_concept: String,
}

#[derive(Deserialize)]
struct RawSlidePlan {
    slide_number: u32,
    title: String,
    #[serde(default)]
    body_content: Vec<String>,
    visual_concept: String,
}

impl TryFrom<RawSlidePlan> for SlidePlan {
    type Error = DeckError;

    fn try_from(raw: RawSlidePlan) -> Result<Self, Self::Error> {
        SlidePlan::new(raw.slide_number, raw.title, raw.body_content, raw.visual_concept)
    }
}

impl SlidePlan {
    /// Build a slide, checking the slide-number bound and required text.
    ///
    /// Titles are meant to be at most eight words; that is guidance for the
    /// model, not a constraint enforced here.
    pub fn new(
        slide_number: u32,
        title: impl Into<String>,
        body_content: Vec<String>,
        visual_concept: impl Into<String>,
    ) -> Result<Self, DeckError> {
        let title = title.into();
        let visual_concept = visual_concept.into();
        check_slide_number("SlidePlan", slide_number)?;
        check_non_empty("SlidePlan", "title", &title)?;
        check_non_empty("SlidePlan", "visual_concept", &visual_concept)?;
        Ok(Self {
            slide_number,
            title,
            body_content,
            visual_concept,
        })
    }

    pub fn slide_number(&self) -> u32 {
        self.slide_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body_content(&self) -> &[String] {
        &self.body_content
    }

    pub fn visual_concept(&self) -> &str {
        &self.visual_concept
    }
}

// ── DeckPlan ─────────────────────────────────────────────────────────────

/// The strategist's full deck: 6–9 slides plus a one-line offer summary.
///
/// Slide-number uniqueness is not a schema constraint; it is checked when
/// the plan is handed to the prompt stage
/// (see [`crate::pipeline::check_plan_transition`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeckPlan")]
pub struct DeckPlan {
    slides: Vec<SlidePlan>,
    offer_summary: String,
}

#[derive(Deserialize)]
struct RawDeckPlan {
    slides: Vec<SlidePlan>,
    offer_summary: String,
}

impl TryFrom<RawDeckPlan> for DeckPlan {
    type Error = DeckError;

    fn try_from(raw: RawDeckPlan) -> Result<Self, Self::Error> {
        DeckPlan::new(raw.slides, raw.offer_summary)
    }
}

impl DeckPlan {
    pub fn new(slides: Vec<SlidePlan>, offer_summary: impl Into<String>) -> Result<Self, DeckError> {
        let offer_summary = offer_summary.into();
        check_count("DeckPlan", "slides", slides.len())?;
        check_non_empty("DeckPlan", "offer_summary", &offer_summary)?;
        Ok(Self {
            slides,
            offer_summary,
        })
    }

    pub fn slides(&self) -> &[SlidePlan] {
        &self.slides
    }

    pub fn offer_summary(&self) -> &str {
        &self.offer_summary
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Slide numbers in plan order.
    pub fn slide_numbers(&self) -> Vec<u32> {
        self.slides.iter().map(SlidePlan::slide_number).collect()
    }
}

// ── NanoBananaPrompt ─────────────────────────────────────────────────────

/// One image-generation request written by the art director.
///
/// Named after the image model family the prompts are tuned for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNanoBananaPrompt")]
pub struct NanoBananaPrompt {
    slide_number: u32,
    prompt: String,
}

#[derive(Deserialize)]
struct RawNanoBananaPrompt {
    slide_number: u32,
    prompt: String,
}

impl TryFrom<RawNanoBananaPrompt> for NanoBananaPrompt {
    type Error = DeckError;

    fn try_from(raw: RawNanoBananaPrompt) -> Result<Self, Self::Error> {
        NanoBananaPrompt::new(raw.slide_number, raw.prompt)
    }
}

impl NanoBananaPrompt {
    pub fn new(slide_number: u32, prompt: impl Into<String>) -> Result<Self, DeckError> {
        let prompt = prompt.into();
        check_slide_number("NanoBananaPrompt", slide_number)?;
        check_non_empty("NanoBananaPrompt", "prompt", &prompt)?;
        Ok(Self {
            slide_number,
            prompt,
        })
    }

    pub fn slide_number(&self) -> u32 {
        self.slide_number
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The prompt with the four mandatory rendering clauses appended.
    ///
    /// Not idempotent: a prompt that already ends with the clauses gets them
    /// a second time. Use [`Self::ensure_formatted`] when that matters.
    pub fn formatted_prompt(&self) -> String {
        format!("{} {}", self.prompt, PROMPT_SPEC_SUFFIX)
    }

    /// The prompt guaranteed to end with the rendering clauses exactly once.
    ///
    /// Clauses the model already wrote are matched ignoring whitespace runs
    /// and letter case; the final period is optional.
    pub fn ensure_formatted(&self) -> String {
        if clause_form(&self.prompt).ends_with(&clause_form(PROMPT_SPEC_SUFFIX)) {
            self.prompt.clone()
        } else {
            self.formatted_prompt()
        }
    }
}

/// Whitespace-collapsed, lowercased text without a trailing period.
fn clause_form(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('.').to_lowercase()
}

// ── VisualPromptSet ──────────────────────────────────────────────────────

/// Every image prompt for one deck, 6–9 entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVisualPromptSet")]
pub struct VisualPromptSet {
    prompts: Vec<NanoBananaPrompt>,
}

#[derive(Deserialize)]
struct RawVisualPromptSet {
    prompts: Vec<NanoBananaPrompt>,
}

impl TryFrom<RawVisualPromptSet> for VisualPromptSet {
    type Error = DeckError;

    fn try_from(raw: RawVisualPromptSet) -> Result<Self, Self::Error> {
        VisualPromptSet::new(raw.prompts)
    }
}

impl VisualPromptSet {
    pub fn new(prompts: Vec<NanoBananaPrompt>) -> Result<Self, DeckError> {
        check_count("VisualPromptSet", "prompts", prompts.len())?;
        Ok(Self { prompts })
    }

    pub fn prompts(&self) -> &[NanoBananaPrompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Slide numbers in prompt order.
    pub fn slide_numbers(&self) -> Vec<u32> {
        self.prompts.iter().map(NanoBananaPrompt::slide_number).collect()
    }
}
