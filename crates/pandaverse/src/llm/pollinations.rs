//! Pollinations text provider.
//!
//! The endpoint speaks the OpenAI response shape but wants its own request
//! envelope: a fixed model name, a system prompt, and explicit `stream` and
//! `private` flags.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::error::LLMError;
use super::provider::LLMProvider;
use super::types::{ChatRequest, ChatResponse, Message, Role};

/// Pollinations provider with a fixed model and system prompt.
pub struct PollinationsProvider {
    client: Client,
    endpoint: String,
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl PollinationsProvider {
    #[must_use]
    pub fn new(
        client: Client,
        endpoint: String,
        model: String,
        system_prompt: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            endpoint,
            model,
            system_prompt,
            temperature,
        }
    }

    fn to_request(&self, request: ChatRequest) -> Request {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(
            request
                .messages
                .into_iter()
                .filter(|m| m.role != Role::System),
        );

        Request {
            model: self.model.clone(),
            messages,
            temperature: request.temperature.unwrap_or(self.temperature),
            stream: false,
            private: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Request {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    stream: bool,
    private: bool,
}

#[async_trait]
impl LLMProvider for PollinationsProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        let body = self.to_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LLMError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}
