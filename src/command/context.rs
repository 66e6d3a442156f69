//! Per-invocation state handed to command handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::param::Value;
use crate::core::Message;
use crate::identity::Identity;

/// Opaque wrapper around the message that triggered a command.
#[derive(Clone, Debug, Default)]
pub struct CommandContext {
    pub message: Option<Message>,
}

impl CommandContext {
    pub fn new(message: Message) -> Self {
        Self {
            message: Some(message),
        }
    }

    /// Context for invocations that did not come from the bridge.
    pub fn none() -> Self {
        Self { message: None }
    }
}

/// Output sink for a single invocation.
///
/// Clones share one buffer, so whatever a handler wrote before failing is
/// still readable by the executor afterwards.
#[derive(Clone, Debug, Default)]
pub struct Output {
    buf: Arc<Mutex<String>>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&self, text: &str) {
        self.lock().push_str(text);
    }

    pub fn println(&self, text: &str) {
        let mut buf = self.lock();
        buf.push_str(text);
        buf.push('\n');
    }

    /// Captured text with trailing whitespace removed.
    pub fn contents(&self) -> String {
        self.lock().trim_end().to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        // A handler that panicked mid-write leaves the text intact.
        self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}

/// Everything a handler receives: bound arguments, injected slots and the sink.
#[derive(Debug)]
pub struct Invocation {
    pub command: String,
    args: HashMap<String, Value>,
    context: Option<CommandContext>,
    identity: Option<Identity>,
    text: Option<String>,
    pub out: Output,
}

impl Invocation {
    pub(crate) fn new(command: &str, args: HashMap<String, Value>, out: Output) -> Self {
        Self {
            command: command.to_string(),
            args,
            context: None,
            identity: None,
            text: None,
            out,
        }
    }

    pub(crate) fn inject_context(&mut self, context: CommandContext) {
        self.context = Some(context);
    }

    pub(crate) fn inject_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub(crate) fn inject_text(&mut self, text: String) {
        self.text = Some(text);
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    /// Multi-valued argument rendered as strings; a scalar yields one item.
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.value(name) {
            Some(Value::List(items)) => items.iter().map(|v| v.to_string()).collect(),
            Some(v) => vec![v.to_string()],
            None => Vec::new(),
        }
    }

    /// Injected context; `None` unless the command asked for it.
    pub fn context(&self) -> Option<&CommandContext> {
        self.context.as_ref()
    }

    /// Resolved sender identity, if injected and known.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Raw invocation text, if injected.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn print(&self, text: &str) {
        self.out.print(text);
    }

    pub fn println(&self, text: &str) {
        self.out.println(text);
    }
}
