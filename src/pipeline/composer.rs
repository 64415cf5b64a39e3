//! Stage 2: [`DeckPlan`] → [`VisualPromptSet`].
//!
//! The art director receives the validated plan as JSON and answers with
//! one image prompt per slide. Like the planner, this stage owns only the
//! contract: instruction out, validated prompt set back. Whether the prompt
//! set covers the plan's slides is checked at the hand-off to the image
//! stage ([`crate::pipeline::check_prompt_transition`]).

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::pipeline::json::extract_json_object;
use crate::pipeline::text_model::TextModel;
use crate::pipeline::Stage;
use crate::prompts::{art_director_request, ART_DIRECTOR_INSTRUCTION};
use crate::schema::{DeckPlan, VisualPromptSet};
use tracing::{debug, info};

/// Ask the model for image prompts covering `plan` and validate them.
pub async fn compose_prompts(
    model: &dyn TextModel,
    plan: &DeckPlan,
    config: &DeckConfig,
) -> Result<VisualPromptSet, DeckError> {
    let system = config
        .art_director_prompt
        .as_deref()
        .unwrap_or(ART_DIRECTOR_INSTRUCTION);

    let plan_json = serde_json::to_string_pretty(plan)
        .map_err(|e| DeckError::Internal(format!("Failed to serialise deck plan: {e}")))?;

    let reply = model
        .complete(Stage::Prompt, system, &art_director_request(&plan_json))
        .await?;
    debug!("Art director reply: {} chars", reply.len());

    let prompts = parse_visual_prompts(&reply)?;
    info!("Visual prompts ready: {} prompts", prompts.len());
    Ok(prompts)
}

/// Parse and validate an art-director reply.
pub fn parse_visual_prompts(reply: &str) -> Result<VisualPromptSet, DeckError> {
    let json = extract_json_object(reply).ok_or_else(|| DeckError::InvalidResponse {
        stage: Stage::Prompt,
        detail: if reply.trim().is_empty() {
            "empty reply".to_string()
        } else {
            "reply contains no JSON object".to_string()
        },
    })?;

    serde_json::from_str::<VisualPromptSet>(&json).map_err(|e| DeckError::SchemaViolation {
        entity: "VisualPromptSet",
        detail: e.to_string(),
    })
}
