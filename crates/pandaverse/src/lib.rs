//! PandaVerse - a chat router for hosted LLM providers and a terminal client
//! that keeps the conversation.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod handlers;
pub mod llm;
pub mod render;
pub mod repl;
pub mod response;
pub mod server;
pub mod store;
