//! slackline-bot: a small bot on top of the slackline connector.
//!
//! Connects to Slack RTM, listens in every channel the bot is a member of,
//! and answers a handful of commands:
//!
//!   ping            — pong
//!   echo <text>     — repeat <text>
//!   hello / hi      — greet the sender
//!
//! Requires a bot token, either in the config file (`api-token`) or in the
//! SLACK_API_TOKEN environment variable.

mod brain;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use slackline_sdk::{Connector, ConnectorConfig};

use brain::Brain;

#[derive(Parser)]
#[command(name = "slackline-bot", about = "Slack RTM bot")]
struct Args {
    /// TOML config file (api-token, default-room, icon-emoji, bot-name, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Slack bot token; overrides the config file
    #[arg(long, env = "SLACK_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Bot display name; overrides the config file
    #[arg(long)]
    bot_name: Option<String>,

    /// Announce startup in the default room
    #[arg(long)]
    announce: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slackline_sdk=info,slackline_bot=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConnectorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConnectorConfig::default(),
    };
    if let Some(token) = args.token {
        config.api_token = Some(token);
    }
    if let Some(name) = args.bot_name {
        config.bot_name = name;
    }

    tracing::info!(
        bot_name = %config.bot_name,
        default_room = %config.default_room,
        "Starting slackline-bot"
    );

    let connector = Arc::new(Connector::new(config).context("invalid configuration")?);
    connector.connect().await.context("connecting to Slack")?;

    if args.announce {
        if let Err(e) = connector.say("Hello, I'm online.").await {
            tracing::warn!(error = %e, "Startup announcement failed");
        }
    }

    let brain = Brain::new(connector.clone());
    tracing::info!("Bot running. Ctrl+C to stop.");

    tokio::select! {
        result = connector.listen(&brain) => {
            result.context("receive loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            connector.shutdown();
        }
    }

    Ok(())
}
