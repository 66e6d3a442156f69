//! bridgebot library root.

pub mod archive;
pub mod bot;
pub mod cli;
pub mod command;
pub mod config;
pub mod core;
pub mod error;
pub mod identity;
pub mod logging;
pub mod modules;
pub mod transport;

pub use bot::Bot;
pub use command::{CommandBuilder, CommandRegistry, Dispatcher, ExecutionResult, Reply};
pub use config::{load_settings, Settings};
pub use self::core::{Message, Pipeline};
pub use error::{Error, Result};
