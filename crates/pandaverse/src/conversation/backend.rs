//! Transport from the conversation manager to the chat endpoint.

use async_trait::async_trait;
use pandaverse_types::{ChatApiRequest, ErrorBody, ModelCatalog};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced to the conversation when a send fails.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("server error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a readable answer.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

/// Something that can answer a single chat message.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one message and return the reply text (possibly empty).
    async fn send(&self, message: &str, model: Option<&str>) -> Result<String, ClientError>;
}

/// Backend that talks to a running chat server over HTTP.
pub struct HttpChatBackend {
    client: Client,
    server_url: String,
}

#[derive(Deserialize)]
struct ReplyBody {
    #[serde(default)]
    reply: Option<String>,
}

impl HttpChatBackend {
    #[must_use]
    pub fn new(client: Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// GET /api/models
    pub async fn models(&self) -> Result<ModelCatalog, ClientError> {
        let url = format!("{}/api/models", self.server_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, message: &str, model: Option<&str>) -> Result<String, ClientError> {
        let url = format!("{}/api/chat", self.server_url);
        let body = ChatApiRequest {
            message: message.to_string(),
            model: model.map(str::to_string),
            provider: None,
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .map(|b| b.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Unknown server error".to_string());
            return Err(ClientError::Api { status, message });
        }

        let body: ReplyBody = response.json().await?;
        Ok(body.reply.unwrap_or_default())
    }
}
