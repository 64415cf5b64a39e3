//! Pipeline stages for offer-to-slides generation.
//!
//! Each submodule implements exactly one step or one external tool.
//!
//! ## Data Flow
//!
//! ```text
//! document ──▶ planner ──▶ composer ──▶ imagegen
//! (.docx text)  (DeckPlan)  (VisualPromptSet)  (slide_NN.png …)
//! ```
//!
//! 1. [`document`]  — `.docx` text extraction and PDF conversion tools
//! 2. [`planner`]   — stage 1: offer text → [`crate::schema::DeckPlan`]
//! 3. [`composer`]  — stage 2: deck plan → [`crate::schema::VisualPromptSet`]
//! 4. [`imagegen`]  — stage 3: one image-model call per slide, sequential
//!
//! [`text_model`] and [`image_model`] are the two seams to external models;
//! [`json`] recovers the JSON object from a chatty text-model reply.
//!
//! Stages hand their outputs to each other directly. The checks that guard
//! each hand-off live in this module ([`check_plan_transition`],
//! [`check_prompt_transition`]).

pub mod composer;
pub mod document;
pub mod image_model;
pub mod imagegen;
pub mod json;
pub mod planner;
pub mod text_model;

use crate::error::DeckError;
use crate::schema::{DeckPlan, VisualPromptSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Position of a run in the fixed `Plan → Prompt → Image → Done` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Offer text → deck plan.
    Plan,
    /// Deck plan → image prompts.
    Prompt,
    /// Image prompts → slide images.
    Image,
    /// Terminal.
    Done,
}

impl Stage {
    /// The stage that follows this one. `Done` is terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::Plan => Stage::Prompt,
            Stage::Prompt => Stage::Image,
            Stage::Image | Stage::Done => Stage::Done,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Done
    }

    /// Key the stage's output is reported under.
    pub fn output_key(self) -> Option<&'static str> {
        match self {
            Stage::Plan => Some("deck_plan"),
            Stage::Prompt => Some("visual_prompts"),
            Stage::Image => Some("generated_images"),
            Stage::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Plan => "plan",
            Stage::Prompt => "prompt",
            Stage::Image => "image",
            Stage::Done => "done",
        })
    }
}

/// Guard for `Plan → Prompt`: slide numbers in the plan must be unique.
///
/// Gaps in the numbering are allowed but logged.
pub fn check_plan_transition(plan: &DeckPlan) -> Result<(), DeckError> {
    let mut seen = BTreeSet::new();
    for n in plan.slide_numbers() {
        if !seen.insert(n) {
            return Err(DeckError::DuplicateSlideNumber { slide_number: n });
        }
    }
    let contiguous = seen.iter().copied().eq(1..=plan.len() as u32);
    if !contiguous {
        warn!(
            "Deck plan slide numbers {:?} are not a contiguous 1..{} range",
            seen,
            plan.len()
        );
    }
    Ok(())
}

/// Guard for `Prompt → Image`: the prompt set must cover exactly the
/// plan's slide numbers, no more and no fewer.
pub fn check_prompt_transition(plan: &DeckPlan, prompts: &VisualPromptSet) -> Result<(), DeckError> {
    let mut expected = plan.slide_numbers();
    let mut found = prompts.slide_numbers();
    expected.sort_unstable();
    found.sort_unstable();
    if expected != found {
        return Err(DeckError::SlideMismatch { expected, found });
    }
    Ok(())
}
