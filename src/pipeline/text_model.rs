//! Text-model seam shared by the planner and the composer.
//!
//! Both text stages need the same thing from a model: a system instruction
//! and one user turn in, a reply string out. [`TextModel`] captures exactly
//! that, so stages can be exercised with a scripted model in tests and run
//! against any [`edgequake_llm::LLMProvider`] in production via
//! [`LlmTextModel`].

use crate::config::{DeckConfig, DEFAULT_PROVIDER};
use crate::error::DeckError;
use crate::pipeline::Stage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A chat model that answers one instruction + one user message.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Send `system` and `user` and return the reply text.
    ///
    /// `stage` is used to label errors.
    async fn complete(&self, stage: Stage, system: &str, user: &str) -> Result<String, DeckError>;
}

/// [`TextModel`] backed by an edgequake-llm provider.
pub struct LlmTextModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmTextModel {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl TextModel for LlmTextModel {
    async fn complete(&self, stage: Stage, system: &str, user: &str) -> Result<String, DeckError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| DeckError::LlmApiError {
                stage,
                message: e.to_string(),
            })?;

        debug!(
            "{} stage: {} input tokens, {} output tokens, {:?}",
            stage,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Build the text models for the plan and prompt stages.
///
/// Returns `(planner, composer)`. Both share one provider resolution; when
/// the provider is created here each stage gets its configured model.
pub fn resolve_text_models(
    config: &DeckConfig,
) -> Result<(Arc<dyn TextModel>, Arc<dyn TextModel>), DeckError> {
    let wrap = |p: Arc<dyn LLMProvider>| -> Arc<dyn TextModel> {
        Arc::new(LlmTextModel::new(p, config.temperature, config.max_tokens))
    };

    // 1) Caller-built provider serves both stages as-is
    if let Some(ref provider) = config.provider {
        return Ok((wrap(Arc::clone(provider)), wrap(Arc::clone(provider))));
    }

    // 2) Environment pair: one provider and model for both stages
    if config.provider_name.is_none() {
        if let Some((name, model)) = provider_pair(
            std::env::var("EDGEQUAKE_LLM_PROVIDER").ok(),
            std::env::var("EDGEQUAKE_MODEL").ok(),
        ) {
            let provider = create_provider(&name, &model)?;
            return Ok((wrap(Arc::clone(&provider)), wrap(provider)));
        }
    }

    // 3) Named provider, one instance per stage model
    if let Some(name) = resolve_provider_name(config) {
        let planner = create_provider(&name, &config.planner_model)?;
        let composer = create_provider(&name, &config.composer_model)?;
        return Ok((wrap(planner), wrap(composer)));
    }

    // 4) Full auto-detection; the detected provider's default model serves both stages
    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DeckError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;
    Ok((wrap(Arc::clone(&provider)), wrap(provider)))
}

/// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, honoured only when both are set.
fn provider_pair(provider: Option<String>, model: Option<String>) -> Option<(String, String)> {
    match (provider, model) {
        (Some(p), Some(m)) if !p.is_empty() && !m.is_empty() => Some((p, m)),
        _ => None,
    }
}

/// Pick the provider name, from most-specific to least-specific.
///
/// 1. `config.provider_name`
/// 2. `EDGEQUAKE_LLM_PROVIDER` from the environment
/// 3. Gemini when `GEMINI_API_KEY` or `GOOGLE_API_KEY` is set, since the
///    default models are Gemini models
///
/// None means "let the factory auto-detect".
fn resolve_provider_name(config: &DeckConfig) -> Option<String> {
    if let Some(ref name) = config.provider_name {
        return Some(name.clone());
    }

    if let Ok(prov) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !prov.is_empty() {
            return Some(prov);
        }
    }

    let has_key = |k: &str| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false);
    if has_key("GEMINI_API_KEY") || has_key("GOOGLE_API_KEY") {
        return Some(DEFAULT_PROVIDER.to_string());
    }

    None
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DeckError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DeckError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_provider_name_wins() {
        let config = DeckConfig::builder().provider_name("anthropic").build().unwrap();
        assert_eq!(resolve_provider_name(&config).as_deref(), Some("anthropic"));
    }

    #[test]
    fn environment_pair_needs_both_values() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(
            provider_pair(some("openai"), some("gpt-4.1-mini")),
            Some(("openai".to_string(), "gpt-4.1-mini".to_string()))
        );
        assert_eq!(provider_pair(some("openai"), None), None);
        assert_eq!(provider_pair(some("openai"), some("")), None);
        assert_eq!(provider_pair(None, some("gpt-4.1-mini")), None);
    }
}
