//! Executor: parse, inject, invoke and capture for one command call.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::context::{CommandContext, Invocation, Output};
use super::descriptor::{CommandDescriptor, Reply};
use super::param::Value;
use super::parser::{bind_captures, ParseOutcome};
use crate::identity::Identity;

/// Outcome of one command call, consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
    /// Name that matched; `None` when no command was found.
    pub command: Option<String>,
    pub is_help: bool,
}

impl ExecutionResult {
    pub fn not_found(name: &str) -> Self {
        Self {
            output: format!("no function {} found", name),
            command: None,
            is_help: false,
        }
    }

    pub fn input_error(detail: &str) -> Self {
        Self {
            output: format!("Error parsing input: {}", detail),
            command: None,
            is_help: false,
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.output.contains('\n')
    }
}

/// Values available for injection into a call.
#[derive(Clone, Debug, Default)]
pub struct CallEnv {
    pub context: CommandContext,
    pub identity: Option<Identity>,
    pub text: String,
}

/// A handler that did not complete normally.
#[derive(Debug)]
enum Failure {
    Error(anyhow::Error),
    Panic(String),
}

impl Failure {
    fn render(&self, command: &str) -> String {
        match self {
            Failure::Error(err) => format!("Error in command '{}': {:?}", command, err),
            Failure::Panic(msg) => format!("command '{}' panicked: {}", command, msg),
        }
    }
}

pub struct Executor;

impl Executor {
    /// Run a prefix invocation with already tokenized arguments.
    pub async fn run(
        desc: &Arc<CommandDescriptor>,
        tokens: &[String],
        env: &CallEnv,
    ) -> ExecutionResult {
        tracing::debug!("calling: {} args: {:?}", desc.name(), tokens);

        match desc.parser().parse(tokens) {
            ParseOutcome::Help(text) => {
                tracing::debug!("help output for {}", desc.name());
                Self::finished(desc, text, true)
            }
            ParseOutcome::Failed(text) => {
                tracing::warn!("argument parsing failed for {}", desc.name());
                Self::finished(desc, text, true)
            }
            ParseOutcome::Parsed(args) => Self::invoke(desc, args, env).await,
        }
    }

    /// Run a pattern invocation from named capture groups.
    pub async fn run_captures(
        desc: &Arc<CommandDescriptor>,
        captures: &HashMap<String, String>,
        env: &CallEnv,
    ) -> ExecutionResult {
        tracing::debug!("calling: {} captures: {:?}", desc.name(), captures);

        match bind_captures(desc.params(), captures) {
            Ok(args) => Self::invoke(desc, args, env).await,
            Err(detail) => {
                tracing::warn!("capture binding failed for {}: {}", desc.name(), detail);
                Self::finished(desc, format!("error: {}", detail), false)
            }
        }
    }

    async fn invoke(
        desc: &Arc<CommandDescriptor>,
        args: HashMap<String, Value>,
        env: &CallEnv,
    ) -> ExecutionResult {
        let out = Output::new();
        let mut inv = Invocation::new(desc.name(), args, out.clone());

        if desc.injects_context() {
            inv.inject_context(env.context.clone());
        }
        if desc.injects_identity() {
            inv.inject_identity(env.identity.clone());
        }
        if desc.injects_text() {
            inv.inject_text(env.text.clone());
        }

        // Own task: a panic comes back as a JoinError.
        let handler = desc.handler();
        let joined = tokio::spawn(async move { handler.call(&mut inv).await }).await;
        let outcome = match joined {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(Failure::Error(err)),
            Err(join_err) if join_err.is_panic() => {
                Err(Failure::Panic(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(Failure::Panic(join_err.to_string())),
        };

        let mut is_help = false;
        match outcome {
            Ok(Reply::Text(text)) => out.println(&text),
            Ok(Reply::Help) => is_help = true,
            Ok(Reply::Nothing) => {}
            Err(failure) => {
                tracing::error!("exception executing {}: {:?}", desc.name(), failure);
                out.println(&failure.render(desc.name()));
            }
        }

        let output = out.contents();
        tracing::debug!("command output: {}", output);
        Self::finished(desc, output, is_help)
    }

    fn finished(desc: &CommandDescriptor, output: String, is_help: bool) -> ExecutionResult {
        ExecutionResult {
            output,
            command: Some(desc.name().to_string()),
            is_help,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
