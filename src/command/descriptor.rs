//! Command descriptors and the declarative registration builder.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::binder::{self, Signature, SlotNames};
use super::context::Invocation;
use super::param::{ArgHint, Param, ParameterSpec};
use super::parser::Parser;
use crate::error::{Error, Result};

/// What a handler hands back besides the text it printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Appended to the captured output.
    Text(String),
    /// Marks the result as help output.
    Help,
    Nothing,
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Nothing
    }
}

/// Command handler.
///
/// Plain closures `Fn(&mut Invocation) -> anyhow::Result<Reply>` implement
/// this; handlers that need to await implement it directly.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, inv: &mut Invocation) -> anyhow::Result<Reply>;
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&mut Invocation) -> anyhow::Result<Reply> + Send + Sync + 'static,
{
    async fn call(&self, inv: &mut Invocation) -> anyhow::Result<Reply> {
        (self)(inv)
    }
}

/// A compiled command. Immutable once registered; reloads swap whole descriptors.
pub struct CommandDescriptor {
    name: String,
    description: Option<String>,
    signature: Signature,
    parser: Parser,
    pattern: Option<Regex>,
    handler: Arc<dyn Handler>,
}

impl CommandDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.signature.params
    }

    /// Argument parser for prefix invocations; also renders help.
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn injects_context(&self) -> bool {
        self.signature.injects_context()
    }

    pub fn injects_identity(&self) -> bool {
        self.signature.injects_identity()
    }

    pub fn injects_text(&self) -> bool {
        self.signature.injects_text()
    }

    /// Anchored pattern used by pattern dispatch.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub(crate) fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.signature.params)
            .field("context", &self.signature.context)
            .field("identity", &self.signature.identity)
            .field("text", &self.signature.text)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .finish()
    }
}

/// Declarative registration of one command.
///
/// ```ignore
/// CommandBuilder::new("repeat")
///     .param(Param::new("text"))
///     .param(Param::new("times").hint(TypeHint::Int))
///     .arg(ArgHint::optional("times").short('n'))
///     .run(|inv| { /* ... */ Ok(Reply::Nothing) })
/// ```
pub struct CommandBuilder {
    name: String,
    description: Option<String>,
    doc: Option<String>,
    params: Vec<Param>,
    hints: Vec<ArgHint>,
    slots: SlotNames,
    pattern: Option<String>,
    handler: Option<Arc<dyn Handler>>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            doc: None,
            params: Vec::new(),
            hints: Vec::new(),
            slots: SlotNames::default(),
            pattern: None,
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Handler documentation; used as the description when none is given.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn arg(mut self, hint: ArgHint) -> Self {
        self.hints.push(hint);
        self
    }

    pub fn inject_context(mut self, name: impl Into<String>) -> Self {
        self.slots.context = Some(name.into());
        self
    }

    pub fn inject_identity(mut self, name: impl Into<String>) -> Self {
        self.slots.identity = Some(name.into());
        self
    }

    pub fn inject_text(mut self, name: impl Into<String>) -> Self {
        self.slots.text = Some(name.into());
        self
    }

    /// Also reach this command when a whole message matches `pattern`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Closure handler; the bound lets argument and return types be inferred.
    pub fn run<F>(self, f: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.handler(f)
    }

    pub fn build(self) -> Result<CommandDescriptor> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::Registration(format!(
                "invalid command name '{}'",
                self.name
            )));
        }

        let handler = self
            .handler
            .ok_or_else(|| Error::Registration(format!("command '{}' has no handler", name)))?;

        let signature = binder::bind(&name, &self.params, &self.hints, &self.slots)?;

        let pattern = match self.pattern {
            Some(raw) => Some(Regex::new(&format!("^(?:{})$", raw)).map_err(|e| {
                Error::Registration(format!("command '{}': bad pattern: {}", name, e))
            })?),
            None => None,
        };

        let description = self
            .description
            .or_else(|| self.doc.as_deref().and_then(summarize_doc));
        let parser = Parser::new(&name, description.as_deref(), &signature.params);

        Ok(CommandDescriptor {
            name,
            description,
            signature,
            parser,
            pattern,
            handler,
        })
    }
}

fn summarize_doc(doc: &str) -> Option<String> {
    let trimmed = doc.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::param::TypeHint;

    fn noop(_: &mut Invocation) -> anyhow::Result<Reply> {
        Ok(Reply::Nothing)
    }

    #[test]
    fn test_build_basic() {
        let desc = CommandBuilder::new("echo")
            .param(Param::new("text").hint(TypeHint::Str))
            .doc("\n    Echo the given text back.\n  ")
            .handler(noop)
            .build()
            .unwrap();

        assert_eq!(desc.name(), "echo");
        assert_eq!(desc.description(), Some("Echo the given text back."));
        assert_eq!(desc.params().len(), 1);
        assert!(desc.pattern().is_none());
        assert!(desc.parser().help().starts_with("Echo the given text back."));
    }

    #[test]
    fn test_explicit_description_wins() {
        let desc = CommandBuilder::new("x")
            .description("explicit")
            .doc("from docs")
            .handler(noop)
            .build()
            .unwrap();
        assert_eq!(desc.description(), Some("explicit"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let desc = CommandBuilder::new("ping")
            .pattern("(?i)ping")
            .handler(noop)
            .build()
            .unwrap();

        let re = desc.pattern().unwrap();
        assert!(re.is_match("PING"));
        assert!(!re.is_match("ping pong"));
    }

    #[test]
    fn test_bad_pattern_fails() {
        let err = CommandBuilder::new("bad")
            .pattern("(unclosed")
            .handler(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
    }

    #[test]
    fn test_missing_handler_fails() {
        assert!(CommandBuilder::new("nothing").build().is_err());
    }

    #[test]
    fn test_name_with_space_rejected() {
        assert!(CommandBuilder::new("two words").handler(noop).build().is_err());
    }
}
