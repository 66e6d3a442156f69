//! bridgebot - chat-command bot for HTTP message bridges.

use clap::Parser;
use std::process::ExitCode;

use bridgebot::cli::Commands;
use bridgebot::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Commands::parse();

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _guard = match logging::init(&args.log_config()) {
        Ok((guard, _dir)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
