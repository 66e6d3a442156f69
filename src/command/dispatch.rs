//! Dispatch: route raw text to commands by name or by pattern.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::CommandContext;
use super::executor::{CallEnv, ExecutionResult, Executor};
use super::parser::tokenize;
use super::registry::CommandRegistry;
use crate::identity::Identity;

/// Front door to the registry for one message at a time.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Prefix dispatch: `text` is the invocation with the prefix stripped.
    pub async fn call(
        &self,
        text: &str,
        context: CommandContext,
        identity: Option<Identity>,
    ) -> ExecutionResult {
        let tokens = match tokenize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("could not tokenize '{}': {}", text, e);
                return ExecutionResult::input_error(&e);
            }
        };

        let Some((name, args)) = tokens.split_first() else {
            return ExecutionResult::input_error("no command given");
        };

        let Some(desc) = self.registry.lookup_exact(name) else {
            tracing::info!("no command named '{}'", name);
            return ExecutionResult::not_found(name);
        };

        let env = CallEnv {
            context,
            identity,
            text: text.to_string(),
        };
        Executor::run(&desc, args, &env).await
    }

    /// Pattern dispatch: run every command whose pattern matches all of `text`.
    ///
    /// Results come back in registration order.
    pub async fn call_patterns(
        &self,
        text: &str,
        context: CommandContext,
        identity: Option<Identity>,
    ) -> Vec<ExecutionResult> {
        let env = CallEnv {
            context,
            identity,
            text: text.to_string(),
        };

        let patterns = self.registry.all_patterns();
        let mut results = Vec::new();
        for (desc, re) in patterns.iter() {
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let named: HashMap<String, String> = re
                .capture_names()
                .flatten()
                .filter_map(|n| caps.name(n).map(|m| (n.to_string(), m.as_str().to_string())))
                .collect();

            tracing::debug!("pattern of '{}' matched", desc.name());
            results.push(Executor::run_captures(desc, &named, &env).await);
        }
        results
    }
}
