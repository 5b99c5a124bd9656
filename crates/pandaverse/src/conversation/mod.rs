//! Client-side conversation state: ordered turns, persistence, summarization.

mod backend;
mod manager;
mod model;

pub use backend::{ChatBackend, ClientError, HttpChatBackend};
pub use manager::{
    ConversationError, ConversationManager, ERROR_PREFIX, GREETING, ManagerOptions,
    NETWORK_ERROR_PREFIX, NO_RESPONSE, STORAGE_KEY_CHAT, STORAGE_KEY_MODEL, STORAGE_KEY_SUMMARY,
    SUMMARY_PREFIX, SUMMARY_PROMPT, Submission,
};
pub use model::ModelSelection;
