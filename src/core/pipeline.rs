//! Poll, queue and dispatch loop.
//!
//! A producer polls the transport and pushes messages onto a FIFO queue;
//! a consumer takes them off one at a time and runs pattern dispatch, then
//! prefix dispatch. Both run on the same task, joined together, so nothing
//! here executes in parallel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::Message;
use crate::archive::ArchiveStore;
use crate::command::{CommandContext, Dispatcher, ExecutionResult};
use crate::identity::{Identity, IdentityLookup};
use crate::transport::Transport;

/// Where a result came from; decides how a single-line reply is worded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Pattern,
    Prefix,
}

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    archive: Option<Arc<dyn ArchiveStore>>,
    identities: Option<Arc<dyn IdentityLookup>>,
    prefix: String,
    poll_interval: Duration,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, dispatcher: Dispatcher, prefix: impl Into<String>) -> Self {
        Self {
            transport,
            dispatcher,
            archive: None,
            identities: None,
            prefix: prefix.into(),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_identities(mut self, identities: Arc<dyn IdentityLookup>) -> Self {
        self.identities = Some(identities);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run producer and consumer until the process ends.
    pub async fn run(&self) {
        tracing::info!(
            "pipeline started (prefix '{}', poll every {:?})",
            self.prefix,
            self.poll_interval
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::join!(self.produce(tx), self.consume(rx));
        tracing::info!("pipeline stopped");
    }

    async fn produce(&self, queue: mpsc::UnboundedSender<Message>) {
        loop {
            match self.transport.poll().await {
                Ok(messages) => {
                    for message in messages {
                        if queue.send(message).is_err() {
                            tracing::warn!("message queue closed, producer exiting");
                            return;
                        }
                    }
                }
                Err(e) => tracing::error!("polling the bridge failed: {}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn consume(&self, mut queue: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = queue.recv().await {
            self.process(&message).await;
        }
    }

    /// Handle one message completely: every pattern match, then the prefix
    /// command, including all replies.
    pub async fn process(&self, message: &Message) {
        tracing::debug!("processing {:?}", message);
        let identity = self.identify(message).await;
        let context = CommandContext::new(message.clone());

        let results = self
            .dispatcher
            .call_patterns(&message.text, context.clone(), identity.clone())
            .await;
        for result in &results {
            self.respond(message, result, Origin::Pattern).await;
        }

        if let Some(invocation) = message.text.strip_prefix(self.prefix.as_str()) {
            tracing::debug!(
                "command: '{}' by {}",
                invocation,
                message.username.as_deref().unwrap_or("unknown")
            );
            let result = self.dispatcher.call(invocation, context, identity).await;
            self.respond(message, &result, Origin::Prefix).await;
        }
    }

    async fn identify(&self, message: &Message) -> Option<Identity> {
        let lookup = self.identities.as_ref()?;
        let name = message.username.as_deref()?;
        let account = message.account.as_deref()?;
        lookup.identify(name, account).await
    }

    async fn respond(&self, message: &Message, result: &ExecutionResult, origin: Origin) {
        if result.output.is_empty() {
            return;
        }

        let text = if result.is_multiline() {
            self.archived(result).await
        } else {
            match (origin, result.command.as_deref()) {
                (Origin::Pattern, Some(name)) => format!("{}: {}", name, result.output),
                _ => result.output.clone(),
            }
        };

        if let Err(e) = self.transport.send(message.reply(text)).await {
            tracing::error!("sending reply failed: {}", e);
        }
    }

    /// Upload long output and return the link; falls back to the output
    /// itself when no archive is configured.
    async fn archived(&self, result: &ExecutionResult) -> String {
        let Some(archive) = &self.archive else {
            return result.output.clone();
        };
        let name = result.command.as_deref().unwrap_or("output");
        let path = format!("command/{}", name);

        match archive.upload(&path, &result.output, result.is_help).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("archiving output of {} failed: {}", name, e);
                format!("could not archive output of {}: {}", name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandBuilder, CommandRegistry, Invocation, Param, Reply};
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Message>>,
    }

    impl Recorder {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn poll(&self) -> Result<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn send(&self, message: Message) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct FailingArchive;

    #[async_trait]
    impl ArchiveStore for FailingArchive {
        async fn upload(&self, _path: &str, _content: &str, _is_help: bool) -> Result<String> {
            Err(Error::Archive("remote unreachable".to_string()))
        }
    }

    struct Fixed;

    #[async_trait]
    impl IdentityLookup for Fixed {
        async fn identify(&self, display_name: &str, account: &str) -> Option<Identity> {
            (display_name == "Nikky").then(|| Identity {
                username: "nikky".to_string(),
                account: account.to_string(),
            })
        }
    }

    fn pipeline(transport: Arc<Recorder>) -> Pipeline {
        let registry = Arc::new(CommandRegistry::new());
        registry
            .register_builder(
                "t",
                CommandBuilder::new("echo")
                    .param(Param::new("text"))
                    .run(|inv: &mut Invocation| Ok(Reply::from(inv.str("text").unwrap_or_default()))),
            )
            .unwrap();
        registry
            .register_builder(
                "t",
                CommandBuilder::new("lines")
                    .run(|_: &mut Invocation| Ok(Reply::from("one\ntwo"))),
            )
            .unwrap();
        registry
            .register_builder(
                "t",
                CommandBuilder::new("quiet").run(|_: &mut Invocation| Ok(Reply::Nothing)),
            )
            .unwrap();
        registry
            .register_builder(
                "t",
                CommandBuilder::new("me")
                    .param(Param::new("user").hint(crate::command::TypeHint::Identity))
                    .inject_identity("user")
                    .run(|inv: &mut Invocation| {
                        Ok(Reply::Text(
                            inv.identity().map(|i| i.username.clone()).unwrap_or_else(|| "?".into()),
                        ))
                    }),
            )
            .unwrap();
        registry
            .register_builder(
                "t",
                CommandBuilder::new("roll")
                    .param(Param::new("n").hint(crate::command::TypeHint::Int))
                    .pattern(r"roll (?P<n>\w+)")
                    .run(|inv: &mut Invocation| Ok(Reply::Text(format!("rolled {}", inv.int("n").unwrap_or(0))))),
            )
            .unwrap();
        Pipeline::new(transport, Dispatcher::new(registry), ".")
    }

    #[tokio::test]
    async fn test_prefix_reply_keeps_gateway() {
        crate::logging::init_test();
        let transport = Arc::new(Recorder::default());
        let pipeline = pipeline(Arc::clone(&transport));

        let mut message = Message::new(".echo hello world");
        message.gateway = Some("main".to_string());
        message.channel = Some("#bots".to_string());
        pipeline.process(&message).await;

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hello world");
        assert_eq!(sent[0].gateway.as_deref(), Some("main"));
        assert!(sent[0].channel.is_none());
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let transport = Arc::new(Recorder::default());
        pipeline(Arc::clone(&transport)).process(&Message::new("echo hi")).await;
        assert!(transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_sends_nothing() {
        let transport = Arc::new(Recorder::default());
        pipeline(Arc::clone(&transport)).process(&Message::new(".quiet")).await;
        assert!(transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_reply() {
        let transport = Arc::new(Recorder::default());
        pipeline(Arc::clone(&transport)).process(&Message::new(".foo")).await;
        assert_eq!(transport.texts(), vec!["no function foo found"]);
    }

    #[tokio::test]
    async fn test_multiline_inline_without_archive() {
        let transport = Arc::new(Recorder::default());
        pipeline(Arc::clone(&transport)).process(&Message::new(".lines")).await;
        assert_eq!(transport.texts(), vec!["one\ntwo"]);
    }

    #[tokio::test]
    async fn test_archive_failure_is_reported() {
        let transport = Arc::new(Recorder::default());
        let pipeline = pipeline(Arc::clone(&transport)).with_archive(Arc::new(FailingArchive));
        pipeline.process(&Message::new(".lines")).await;

        let texts = transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("could not archive output of lines"));
    }

    #[tokio::test]
    async fn test_pattern_reply_prefixed_once() {
        let transport = Arc::new(Recorder::default());
        let pipeline = pipeline(Arc::clone(&transport));
        pipeline.process(&Message::new("roll 4")).await;
        pipeline.process(&Message::new("roll many")).await;

        assert_eq!(
            transport.texts(),
            vec![
                "roll: rolled 4",
                "roll: error: argument n: invalid int value: 'many'",
            ]
        );
    }

    #[tokio::test]
    async fn test_identity_resolved_from_username_and_account() {
        let transport = Arc::new(Recorder::default());
        let pipeline = pipeline(Arc::clone(&transport)).with_identities(Arc::new(Fixed));

        let mut message = Message::new(".me");
        message.username = Some("Nikky".to_string());
        message.account = Some("irc.esper".to_string());
        pipeline.process(&message).await;

        // No account means no lookup.
        let mut anonymous = Message::new(".me");
        anonymous.username = Some("Nikky".to_string());
        pipeline.process(&anonymous).await;

        assert_eq!(transport.texts(), vec!["nikky", "?"]);
    }

    #[tokio::test]
    async fn test_identity_read_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        tokio::fs::write(
            &path,
            r#"{"users": [{"username": "nikky", "accounts": [{"account": "irc.esper", "nickname": "nikky_"}]}]}"#,
        )
        .await
        .unwrap();

        let transport = Arc::new(Recorder::default());
        let store = crate::identity::FileIdentityStore::new(&path);
        let pipeline = pipeline(Arc::clone(&transport)).with_identities(Arc::new(store));

        let mut message = Message::new(".me");
        message.username = Some("nikky_".to_string());
        message.account = Some("irc.esper".to_string());
        pipeline.process(&message).await;

        assert_eq!(transport.texts(), vec!["nikky"]);
    }
}
