//! Logging setup for bridgebot using tracing.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Initialize logging: a daily rolling file (plain or JSON lines) plus
/// console output on stderr.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init(config: &LogConfig) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir(config)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, &config.file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking.clone())
            .with_target(true)
            .with_current_span(false)
    });
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_writer(non_blocking.clone())
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter(config)?)
        .with(json_layer)
        .with(text_layer)
        .with(console_layer)
        .init();

    tracing::info!("bridgebot logging initialized");
    tracing::info!("Log file: {}", log_dir.join(&config.file).display());

    Ok((guard, log_dir))
}

/// `RUST_LOG` when set and valid, the configured directives otherwise.
fn filter(config: &LogConfig) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?)
}

fn log_dir(config: &LogConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.dir {
        return Ok(dir.clone());
    }
    let dirs = directories::ProjectDirs::from("org", "bridgebot", "bridgebot")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}

/// Initialize logging for tests (console only, no file).
///
/// Safe to call from several tests; only the first call installs a subscriber.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_dir_wins() {
        let config = LogConfig {
            dir: Some(PathBuf::from("/var/log/bridgebot")),
            ..Default::default()
        };
        assert_eq!(log_dir(&config).unwrap(), PathBuf::from("/var/log/bridgebot"));
    }

    #[test]
    fn test_default_dir_under_data_dir() {
        if let Ok(dir) = log_dir(&LogConfig::default()) {
            assert!(dir.ends_with("logs"));
        }
    }

    #[test]
    fn test_configured_filter_parses() {
        assert!(filter(&LogConfig::default()).is_ok());
    }
}
