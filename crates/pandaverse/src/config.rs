use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

// ============================================================================
// ProvidersConfig
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub pollinations: PollinationsConfig,
}

#[derive(Debug, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_openrouter_api_key_env")]
    pub api_key_env: String,
    /// Model used when a request names none.
    #[serde(default = "default_server_model")]
    pub default_model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            api_key_env: default_openrouter_api_key_env(),
            default_model: default_server_model(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openrouter_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_server_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PollinationsConfig {
    #[serde(default = "default_pollinations_endpoint")]
    pub endpoint: String,
    /// Model value that routes a request here instead of to OpenRouter.
    #[serde(default = "default_pollinations_sentinel")]
    pub sentinel: String,
    /// Model name sent upstream.
    #[serde(default = "default_pollinations_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for PollinationsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pollinations_endpoint(),
            sentinel: default_pollinations_sentinel(),
            model: default_pollinations_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
        }
    }
}

fn default_pollinations_endpoint() -> String {
    "https://text.pollinations.ai/openai".to_string()
}

fn default_pollinations_sentinel() -> String {
    "Pollination".to_string()
}

fn default_pollinations_model() -> String {
    "openai".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

// ============================================================================
// ClientConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Model used when nothing has been selected yet.
    #[serde(default = "default_client_model")]
    pub default_model: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Turn count at which the conversation is summarized.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,
    /// Turns kept verbatim after summarization.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    #[serde(default = "default_highlight")]
    pub highlight: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            default_model: default_client_model(),
            data_dir: default_data_dir(),
            summarize_threshold: default_summarize_threshold(),
            keep_recent: default_keep_recent(),
            highlight: default_highlight(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_client_model() -> String {
    "meta-llama/llama-3.3-70b-instruct:free".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".pandaverse/chat")
}

fn default_summarize_threshold() -> usize {
    20
}

fn default_keep_recent() -> usize {
    5
}

fn default_highlight() -> bool {
    true
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

// ============================================================================
// Tests
// ============================================================================
