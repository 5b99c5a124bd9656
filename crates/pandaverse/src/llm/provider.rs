//! LLM provider trait and the provider kinds the router can target.

use std::fmt;

use async_trait::async_trait;

use super::error::LLMError;
use super::types::{ChatRequest, ChatResponse};

/// Trait for LLM providers with different API formats.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Make a single, non-streaming chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError>;
}

/// Upstream services a chat request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// OpenRouter, spoken to through the OpenAI-compatible API.
    OpenRouter,
    /// Pollinations public text endpoint.
    Pollinations,
}

impl Provider {
    /// Parse a client-supplied provider hint.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Some(Provider::OpenRouter),
            "pollination" | "pollinations" => Some(Provider::Pollinations),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenRouter => write!(f, "openrouter"),
            Provider::Pollinations => write!(f, "pollinations"),
        }
    }
}
