mod chat_cmd;
mod config_cmd;
mod history_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sidequest_companion::{ChatSession, HttpCompanionApi, HttpOptions, MockCompanionApi, StaticTokenAuth};
use sidequest_config::{config_dir, config_file_path, load_and_prepare, validate, SideQuestConfig};
use sidequest_core::{AuthProvider, CompanionApi};
use sidequest_logging::init_logger;

/// Token used against the offline mock backend.
const MOCK_TOKEN: &str = "mock-token";

#[derive(Parser)]
#[command(name = "sidequest")]
#[command(about = "Chat with your SideQuest companion from the terminal")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.sidequest/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory backend instead of the companion API
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat,
    /// Send one message and print the reply
    Send {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print the latest conversation
    History,
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;

    init_logger(
        config.logging.dir.as_deref().map(Path::new),
        &config.logging.level,
        config.logging.json,
    );
    // Config warnings raised during loading predate the subscriber.
    for warning in validate(&config).warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }

    if let Commands::Config = cli.command {
        return config_cmd::run(&config, &path);
    }

    let session = connect(&config, cli.mock).await?;
    match cli.command {
        Commands::Chat => chat_cmd::run(&session).await,
        Commands::Send { text } => chat_cmd::send_once(&session, &text.join(" ")).await,
        Commands::History => history_cmd::run(&session),
        Commands::Config => Ok(()),
    }
}

/// Build the backend and token source, then load the latest conversation.
async fn connect(config: &SideQuestConfig, mock: bool) -> Result<ChatSession> {
    let (api, auth): (Arc<dyn CompanionApi>, Arc<dyn AuthProvider>) = if mock {
        info!("Using in-memory companion backend");
        (
            Arc::new(MockCompanionApi::new()),
            Arc::new(StaticTokenAuth::new(MOCK_TOKEN)),
        )
    } else {
        let base_url = config.api.resolved_base_url();
        let options = HttpOptions {
            request_timeout: Duration::from_secs(config.api.request_timeout_secs),
            connect_timeout: Duration::from_secs(config.api.connect_timeout_secs),
        };
        info!(base_url = %base_url, "Using companion API");
        (
            Arc::new(HttpCompanionApi::with_options(base_url, options)?),
            Arc::new(StaticTokenAuth::from_optional(config.auth.token.clone())),
        )
    };

    let session = ChatSession::connect(api, auth).await;
    info!(session = session.session_id(), "Chat session ready");
    Ok(session)
}
