//! CLI commands for bridgebot using clap.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::bot::Bot;
use crate::config::{load_settings, LogConfig, Settings};
use crate::core::Message;
use crate::transport::{HttpTransport, Transport};

/// bridgebot - chat commands for HTTP message bridges.
#[derive(Parser)]
#[command(name = "bridgebot")]
#[command(version)]
#[command(about = "Chat-command bot for HTTP message bridges", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.bridgebot/settings.json)
    #[arg(long, global = true, env = "BRIDGEBOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll the bridge and answer commands until interrupted
    Run,

    /// Run a single command locally and print its output
    Call {
        /// Command line, with or without the prefix
        text: String,
    },

    /// List registered commands
    List,

    /// Post a message to the bridge
    Send {
        /// Message text
        message: String,

        /// Gateway to send through
        #[arg(long)]
        gateway: Option<String>,
    },
}

impl Commands {
    /// Logging section of the settings file; defaults when the file is
    /// missing or invalid, since nothing can be logged yet.
    pub fn log_config(&self) -> LogConfig {
        load_settings(self.config.as_deref())
            .map(|settings| settings.log)
            .unwrap_or_default()
    }

    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let config = self.config.as_deref();
        match &self.command {
            Command::Run => cmd_run(load_settings(config)?).await,
            Command::Call { text } => cmd_call(settings_or_default(config), text).await,
            Command::List => cmd_list(settings_or_default(config)),
            Command::Send { message, gateway } => {
                cmd_send(load_settings(config)?, message, gateway.clone()).await
            }
        }
    }
}

/// Local commands work without a settings file.
fn settings_or_default(path: Option<&std::path::Path>) -> Settings {
    match load_settings(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("using default settings: {}", e);
            Settings::default()
        }
    }
}

async fn cmd_run(settings: Settings) -> Result<()> {
    tracing::info!(
        "connecting to {} as {}",
        settings.base_url(),
        settings.username
    );
    let bot = Bot::new(settings);
    let pipeline = bot.pipeline()?;

    tokio::select! {
        _ = pipeline.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupted, shutting down");
        }
    }
    Ok(())
}

async fn cmd_call(settings: Settings, text: &str) -> Result<()> {
    let bot = Bot::new(settings);
    let result = bot.call(text).await;
    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    if result.command.is_none() {
        anyhow::bail!("command failed: {}", result.output);
    }
    Ok(())
}

fn cmd_list(settings: Settings) -> Result<()> {
    let bot = Bot::new(settings);
    println!("{}", crate::modules::builtin::listing(bot.registry()));
    Ok(())
}

async fn cmd_send(settings: Settings, text: &str, gateway: Option<String>) -> Result<()> {
    let transport = HttpTransport::from_settings(&settings)?;
    let mut message = Message::new(text);
    message.gateway = gateway;
    transport.send(message).await?;
    println!("Sent.");
    Ok(())
}
