//! Terminal chat front-end.

use std::path::PathBuf;
use std::sync::Arc;

use pandaverse_types::ModelCatalog;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::conversation::{
    ConversationError, ConversationManager, HttpChatBackend, ManagerOptions,
};
use crate::render::Renderer;
use crate::store::FileStore;

const HELP: &str = "\
Commands:
  /model [id]   show or select the model
  /models       list models offered by the server
  /clear        start a new conversation
  /quit         leave";

/// Settings for one chat session.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub server_url: String,
    pub data_dir: PathBuf,
    pub model: Option<String>,
    pub highlight: bool,
    pub reset: bool,
    pub manager: ManagerOptions,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Message(String),
    Model(Option<String>),
    Models,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };

    match name {
        "model" => Input::Model(arg.map(str::to_string)),
        "models" => Input::Models,
        "clear" => Input::Clear,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

fn format_catalog(catalog: &ModelCatalog, current: &str) -> String {
    let mark = |id: &str| if id == current { "*" } else { " " };

    let mut out = String::from("Providers\n");
    for entry in &catalog.providers {
        out.push_str(&format!(" {} {:<28} {}\n", mark(&entry.id), entry.title, entry.id));
    }
    for group in &catalog.groups {
        out.push_str(&format!("{}\n", group.title));
        for entry in &group.models {
            out.push_str(&format!(" {} {:<28} {}\n", mark(&entry.id), entry.title, entry.id));
        }
    }
    out
}

/// Run the interactive chat loop until the user quits.
pub async fn run(options: ChatOptions) -> anyhow::Result<()> {
    let backend = Arc::new(HttpChatBackend::new(Client::new(), &options.server_url));
    let store = Arc::new(FileStore::new(&options.data_dir));
    let manager = ConversationManager::load(store, backend.clone(), options.manager.clone());

    if options.reset {
        manager.reset();
    }
    if let Some(model) = options.model {
        manager.set_model(model);
    }

    let renderer = if options.highlight {
        Renderer::styled()
    } else {
        Renderer::plain()
    };

    for turn in manager.turns() {
        println!("{}", renderer.render_turn(&turn));
    }
    println!("(type /help for commands)");

    let mut editor = Reedline::create();
    let mut pending: Option<JoinHandle<()>> = None;

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(manager.model().display_name().to_string()),
            DefaultPromptSegment::Empty,
        );
        let line = match editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => line,
            Ok(_) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Unknown(name) => println!("unknown command /{name}\n{HELP}"),
            Input::Clear => {
                manager.reset();
                for turn in manager.turns() {
                    println!("{}", renderer.render_turn(&turn));
                }
            }
            Input::Model(None) => println!("model: {}", manager.model()),
            Input::Model(Some(id)) => {
                manager.set_model(id);
                println!("model: {}", manager.model());
            }
            Input::Models => match backend.models().await {
                Ok(catalog) => print!("{}", format_catalog(&catalog, manager.model().id())),
                Err(e) => eprintln!("could not list models: {e}"),
            },
            Input::Message(text) => {
                eprintln!("Thinking…");
                match manager.submit(&text).await {
                    Ok(submission) => {
                        println!("{}", renderer.render_turn(&submission.reply));
                        if submission.summarization.is_some() {
                            pending = submission.summarization;
                        }
                    }
                    Err(ConversationError::EmptyMessage) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    // Let an in-flight summary land so the next session starts compact.
    if let Some(handle) = pending {
        finish_summarization(handle).await;
    }

    Ok(())
}

/// Wait for a background summarization. Returns false if the task died.
async fn finish_summarization(handle: JoinHandle<()>) -> bool {
    if !handle.is_finished() {
        debug!("Waiting for summarization before exit");
    }
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Summarization task failed");
            false
        }
    }
}
