//! Request routing: pick an upstream provider for a chat message.

use tracing::{debug, info};

use super::error::LLMError;
use super::provider::Provider;
use super::registry::ProviderRegistry;
use super::types::ChatRequest;
use crate::config::ProvidersConfig;

/// A resolved destination for one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// OpenRouter with a concrete model id.
    OpenRouter { model: String },
    /// Pollinations; the model is fixed by the provider configuration.
    Pollinations,
}

impl Route {
    pub fn provider(&self) -> Provider {
        match self {
            Route::OpenRouter { .. } => Provider::OpenRouter,
            Route::Pollinations => Provider::Pollinations,
        }
    }
}

/// Errors from dispatching a routed message.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("provider '{0}' not configured")]
    NotConfigured(Provider),

    #[error(transparent)]
    Llm(#[from] LLMError),
}

impl RouteError {
    pub fn user_message(&self) -> String {
        match self {
            RouteError::NotConfigured(_) => self.to_string(),
            RouteError::Llm(e) => e.user_message(),
        }
    }
}

/// Resolves routes and forwards messages to the matching provider.
#[derive(Clone)]
pub struct ChatRouter {
    providers: ProviderRegistry,
    default_model: String,
    sentinel: String,
}

impl ChatRouter {
    pub fn new(
        providers: ProviderRegistry,
        default_model: impl Into<String>,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            providers,
            default_model: default_model.into(),
            sentinel: sentinel.into(),
        }
    }

    pub fn from_config(config: &ProvidersConfig, providers: ProviderRegistry) -> Self {
        Self::new(
            providers,
            config.openrouter.default_model.clone(),
            config.pollinations.sentinel.clone(),
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Resolve the request's model and provider hint into a route.
    ///
    /// The sentinel model value or a Pollinations hint selects Pollinations;
    /// everything else goes to OpenRouter, with an empty or missing model
    /// replaced by the default.
    pub fn resolve(&self, model: Option<&str>, provider_hint: Option<&str>) -> Route {
        let model = model.filter(|m| !m.is_empty());
        let hinted = provider_hint.and_then(|hint| {
            let provider = Provider::from_hint(hint);
            if provider.is_none() {
                debug!(hint, "Ignoring unknown provider hint");
            }
            provider
        });

        if model == Some(self.sentinel.as_str()) || hinted == Some(Provider::Pollinations) {
            return Route::Pollinations;
        }

        Route::OpenRouter {
            model: model.unwrap_or(&self.default_model).to_string(),
        }
    }

    /// Send one user message along the route and return the normalized reply.
    ///
    /// Exactly one upstream call is made; failures are not retried.
    pub async fn dispatch(&self, route: &Route, message: String) -> Result<String, RouteError> {
        let provider = route.provider();
        let Some(implementation) = self.providers.get(&provider) else {
            return Err(RouteError::NotConfigured(provider));
        };

        let model = match route {
            Route::OpenRouter { model } => model.clone(),
            Route::Pollinations => self.sentinel.clone(),
        };

        info!(%provider, %model, "Forwarding chat message");
        let response = implementation
            .chat(ChatRequest::user(model, message))
            .await?;

        let usage = response.usage.clone().unwrap_or_default();
        debug!(
            %provider,
            id = response.id.as_deref().unwrap_or("-"),
            finish_reason = response.finish_reason().unwrap_or("-"),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Chat completion received"
        );
        Ok(response.into_reply())
    }
}
