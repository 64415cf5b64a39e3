//! Stage 1: offer text → [`DeckPlan`].
//!
//! The narrative itself is the model's job. This stage owns the contract:
//! it sends the strategist instruction, recovers the JSON object from the
//! reply and lets [`DeckPlan`]'s validation decide whether the result is
//! usable. A reply that fails validation halts the pipeline here.

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::pipeline::json::extract_json_object;
use crate::pipeline::text_model::TextModel;
use crate::pipeline::Stage;
use crate::prompts::{strategist_request, STRATEGIST_INSTRUCTION};
use crate::schema::DeckPlan;
use tracing::{debug, info};

/// Ask the model for a deck plan and validate it.
pub async fn plan_deck(
    model: &dyn TextModel,
    offer_text: &str,
    config: &DeckConfig,
) -> Result<DeckPlan, DeckError> {
    if offer_text.trim().is_empty() {
        return Err(DeckError::InvalidConfig(
            "offer text is empty; nothing to plan".into(),
        ));
    }

    let system = config
        .strategist_prompt
        .as_deref()
        .unwrap_or(STRATEGIST_INSTRUCTION);

    let reply = model
        .complete(Stage::Plan, system, &strategist_request(offer_text))
        .await?;
    debug!("Strategist reply: {} chars", reply.len());

    let plan = parse_deck_plan(&reply)?;
    info!(
        "Deck plan ready: {} slides for \"{}\"",
        plan.len(),
        plan.offer_summary()
    );
    Ok(plan)
}

/// Parse and validate a strategist reply.
pub fn parse_deck_plan(reply: &str) -> Result<DeckPlan, DeckError> {
    let json = extract_json_object(reply).ok_or_else(|| DeckError::InvalidResponse {
        stage: Stage::Plan,
        detail: if reply.trim().is_empty() {
            "empty reply".to_string()
        } else {
            "reply contains no JSON object".to_string()
        },
    })?;

    serde_json::from_str::<DeckPlan>(&json).map_err(|e| DeckError::SchemaViolation {
        entity: "DeckPlan",
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_json(slides: u32) -> String {
        let slides: Vec<String> = (1..=slides)
            .map(|n| {
                format!(
                    r#"{{"slide_number": {n}, "title": "Beat {n}", "body_content": ["a", "b"], "visual_concept": "icon {n}"}}"#
                )
            })
            .collect();
        format!(
            r#"{{"slides": [{}], "offer_summary": "SEO retainer"}}"#,
            slides.join(",")
        )
    }

    #[test]
    fn parses_fenced_plan() {
        let reply = format!("Here you go:\n```json\n{}\n```", plan_json(7));
        let plan = parse_deck_plan(&reply).unwrap();
        assert_eq!(plan.len(), 7);
        assert_eq!(plan.offer_summary(), "SEO retainer");
        assert_eq!(plan.slides()[0].body_content(), ["a", "b"]);
    }

    #[test]
    fn too_few_slides_is_schema_violation() {
        let err = parse_deck_plan(&plan_json(5)).unwrap_err();
        assert!(matches!(err, DeckError::SchemaViolation { entity: "DeckPlan", .. }));
        assert!(err.to_string().contains("got 5"), "got: {err}");
    }

    #[test]
    fn missing_json_is_invalid_response() {
        let err = parse_deck_plan("I'm sorry, I can't do that.").unwrap_err();
        assert!(matches!(err, DeckError::InvalidResponse { stage: Stage::Plan, .. }));

        let err = parse_deck_plan("   ").unwrap_err();
        assert!(err.to_string().contains("empty reply"));
    }

    #[test]
    fn out_of_range_slide_number_rejected() {
        let reply = plan_json(6).replace("\"slide_number\": 6", "\"slide_number\": 10");
        assert!(parse_deck_plan(&reply).is_err());
    }
}
