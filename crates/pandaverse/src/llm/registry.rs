//! Provider registry for managing LLM provider instances.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::openai::OpenAICompatibleProvider;
use super::pollinations::PollinationsProvider;
use super::provider::{LLMProvider, Provider};
use crate::config::ProvidersConfig;

/// Registry of LLM providers, keyed by provider type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every provider from configuration, sharing one HTTP client.
    ///
    /// The OpenRouter key is read from the environment variable named in the
    /// config. A missing key is not fatal: requests go out unauthenticated and
    /// the upstream rejection is reported to the caller.
    pub fn from_config(config: &ProvidersConfig, client: Client) -> Self {
        let mut registry = Self::new();

        let api_key = std::env::var(&config.openrouter.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.openrouter.api_key_env,
                "OpenRouter API key not set; requests will be unauthenticated"
            );
        }
        let openrouter = OpenAICompatibleProvider::new(
            client.clone(),
            config.openrouter.base_url.clone(),
            api_key,
        );
        registry.register(Provider::OpenRouter, Arc::new(openrouter));
        info!(base_url = %config.openrouter.base_url, "Registered OpenRouter provider");

        let pollinations = PollinationsProvider::new(
            client,
            config.pollinations.endpoint.clone(),
            config.pollinations.model.clone(),
            config.pollinations.system_prompt.clone(),
            config.pollinations.temperature,
        );
        registry.register(Provider::Pollinations, Arc::new(pollinations));
        info!(endpoint = %config.pollinations.endpoint, "Registered Pollinations provider");

        registry
    }

    /// Register a provider implementation.
    pub fn register(&mut self, provider: Provider, implementation: Arc<dyn LLMProvider>) {
        self.providers.insert(provider, implementation);
    }

    /// Get a provider by type.
    pub fn get(&self, provider: &Provider) -> Option<Arc<dyn LLMProvider>> {
        self.providers.get(provider).cloned()
    }
}
