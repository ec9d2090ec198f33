//! Chatbot subsystem: answers questions about a classification result.
//!
//! The language model is reached through an [`LlmProvider`] which is built
//! and probed by a background loader task. Until that task succeeds every
//! reply comes from the static condition table (degraded mode).
//!
//! Lifecycle state lives in a `watch` channel. `start()` performs the
//! `NotStarted → Loading` check-and-set inside `send_if_modified`, so at most
//! one loader task is ever spawned. A failed load is terminal.

pub mod conditions;
pub mod prompt;
pub mod state;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{ChatbotConfig, LlmConfig};
use crate::llm::{providers, GenerationParams, LlmProvider, ProviderError};
use crate::supervisor::health::HealthReporter;

use prompt::{PromptBuilder, DEFAULT_RADIOLOGIX_TEMPLATE, RADIOLOGIX_TEMPLATE};
pub use state::ModelState;

const NO_INFO: &str = "No specific information available.";

pub struct ChatbotSubsystem {
    llm: LlmConfig,
    api_key: Option<String>,
    require_api_key: bool,
    params: GenerationParams,
    template: String,
    state: watch::Sender<ModelState>,
    health: HealthReporter,
}

impl ChatbotSubsystem {
    /// Build the subsystem in `NotStarted`. Nothing is loaded until
    /// [`start`](Self::start) or the first [`respond`](Self::respond).
    pub async fn new(
        config: &ChatbotConfig,
        llm: &LlmConfig,
        api_key: Option<String>,
        health: HealthReporter,
    ) -> Arc<Self> {
        let template = PromptBuilder::new(&config.prompts_dir)
            .layer_or(RADIOLOGIX_TEMPLATE, DEFAULT_RADIOLOGIX_TEMPLATE)
            .build();
        let (state, _) = watch::channel(ModelState::NotStarted);

        health.set_unhealthy("not started").await;

        Arc::new(Self {
            llm: llm.clone(),
            api_key,
            require_api_key: config.require_api_key,
            params: GenerationParams::from(&config.generation),
            template,
            state,
            health,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    /// Wait until no load is in flight and return the state at that moment.
    pub async fn wait_settled(&self) -> ModelState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(ModelState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Begin loading the language model in the background.
    ///
    /// Returns `true` only for the call that performed `NotStarted → Loading`;
    /// every other call, concurrent or later, is a no-op.
    pub fn start(self: &Arc<Self>) -> bool {
        let triggered = self.state.send_if_modified(|state| {
            if matches!(state, ModelState::NotStarted) {
                *state = ModelState::Loading;
                true
            } else {
                false
            }
        });
        if triggered {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.load().await });
        }
        triggered
    }

    async fn load(&self) {
        info!(
            provider = %self.llm.provider,
            model = %self.llm.openai.model,
            "loading chatbot model"
        );
        self.health.set_unhealthy("loading").await;

        match self.connect().await {
            Ok(provider) => {
                info!(provider = provider.name(), "chatbot model ready");
                self.health
                    .set_healthy_with(
                        "ready",
                        Some(serde_json::json!({
                            "provider": provider.name(),
                            "model": self.llm.openai.model,
                        })),
                    )
                    .await;
                self.state.send_replace(ModelState::Ready(provider));
            }
            Err(e) => {
                error!(error = %e, "chatbot model failed to load; staying in degraded mode");
                self.health.set_unhealthy(format!("unavailable: {e}")).await;
                self.state.send_replace(ModelState::Unavailable(e.to_string()));
            }
        }
    }

    async fn connect(&self) -> Result<LlmProvider, ProviderError> {
        if self.require_api_key && self.api_key.is_none() {
            return Err(ProviderError::MissingApiKey(self.llm.provider.clone()));
        }
        let provider = providers::build(&self.llm, self.api_key.clone())?;
        provider.ping().await?;
        Ok(provider)
    }

    /// Answer `message` about `predicted_class`.
    ///
    /// Never fails: not-ready and generation errors fall back to canned text.
    pub async fn respond(self: &Arc<Self>, message: &str, predicted_class: &str) -> String {
        self.start();

        let provider = match &*self.state.borrow() {
            ModelState::Ready(p) => Some(p.clone()),
            _ => None,
        };
        let Some(provider) = provider else {
            debug!(state = self.state.borrow().name(), predicted_class, "chatbot in degraded mode");
            return conditions::degraded_reply(predicted_class);
        };

        let prompt = self.render_prompt(message, predicted_class);
        match provider.complete(&prompt, &self.params).await {
            Ok(resp) => {
                if let Some(usage) = &resp.usage {
                    debug!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "chatbot generation finished"
                    );
                }
                resp.text.trim().to_string()
            }
            Err(e) => {
                warn!(error = %e, predicted_class, "chatbot generation failed");
                conditions::apology_reply(predicted_class)
            }
        }
    }

    fn render_prompt(&self, message: &str, predicted_class: &str) -> String {
        PromptBuilder::new("")
            .append(self.template.as_str())
            .with_vars([
                ("condition", predicted_class),
                ("info", conditions::describe(predicted_class).unwrap_or(NO_INFO)),
                ("message", message),
            ])
            .build()
    }
}
