use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pandaverse::config::Config;
use pandaverse::conversation::ManagerOptions;
use pandaverse::llm::{ChatRouter, ProviderRegistry};
use pandaverse::repl::{self, ChatOptions};
use pandaverse::server::{AppState, build_app};

#[derive(Parser)]
#[command(name = "pandaverse", version, about = "Chat with hosted LLMs")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true, default_value = "pandaverse.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat router HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat in the terminal through a running server
    Chat {
        /// Base URL of the chat server
        #[arg(long)]
        server: Option<String>,
        /// Model id, or the Pollinations sentinel value
        #[arg(short, long)]
        model: Option<String>,
        /// Where the conversation is kept between sessions
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Disable ANSI styling and code highlighting
        #[arg(long)]
        no_highlight: bool,
        /// Start from an empty conversation
        #[arg(long)]
        reset: bool,
    },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(&config.providers, Client::new());
    let router = ChatRouter::from_config(&config.providers, registry);
    let app = build_app(AppState::new(router), config.server.request_timeout_seconds);

    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.server.host),
        port.unwrap_or(config.server.port)
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the chat screen clean unless RUST_LOG asks for more.
    init_tracing(match cli.command {
        Command::Serve { .. } => "info",
        Command::Chat { .. } => "warn",
    });

    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Chat {
            server,
            model,
            data_dir,
            no_highlight,
            reset,
        } => {
            let client = config.client;
            repl::run(ChatOptions {
                server_url: server.unwrap_or(client.server_url),
                data_dir: data_dir.unwrap_or(client.data_dir),
                model,
                highlight: client.highlight && !no_highlight,
                reset,
                manager: ManagerOptions {
                    summarize_threshold: client.summarize_threshold,
                    keep_recent: client.keep_recent,
                    default_model: client.default_model,
                },
            })
            .await
        }
    }
}
