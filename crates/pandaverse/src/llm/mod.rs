//! LLM provider clients and request routing.

mod error;
mod openai;
mod pollinations;
mod provider;
mod registry;
mod router;
mod types;

pub use error::LLMError;
pub use openai::OpenAICompatibleProvider;
pub use pollinations::PollinationsProvider;
pub use provider::{LLMProvider, Provider};
pub use registry::ProviderRegistry;
pub use router::{ChatRouter, Route, RouteError};
pub use types::{ChatRequest, ChatResponse, Choice, ChoiceMessage, Message, Role, Usage};
