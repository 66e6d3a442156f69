//! Pipeline ordering and reply routing with in-memory collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bridgebot::archive::ArchiveStore;
use bridgebot::command::{
    CommandBuilder, CommandRegistry, Dispatcher, Handler, Invocation, Param, Reply,
};
use bridgebot::transport::Transport;
use bridgebot::{Message, Pipeline, Result};

/// Hands out one batch, then nothing.
#[derive(Default)]
struct Scripted {
    batch: Mutex<Option<Vec<Message>>>,
    sent: Mutex<Vec<Message>>,
}

impl Scripted {
    fn with_batch(texts: &[&str]) -> Arc<Self> {
        let batch = texts.iter().map(|t| Message::new(*t)).collect();
        Arc::new(Self {
            batch: Mutex::new(Some(batch)),
            ..Default::default()
        })
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn poll(&self) -> Result<Vec<Message>> {
        Ok(self.batch.lock().unwrap().take().unwrap_or_default())
    }

    async fn send(&self, message: Message) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryArchive {
    uploads: Mutex<Vec<(String, String, bool)>>,
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn upload(&self, path: &str, content: &str, is_help: bool) -> Result<String> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string(), is_help));
        Ok(format!("https://wiki.example/{}", path))
    }
}

/// Sleeps before answering and records when it starts and ends.
struct Slow {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Handler for Slow {
    async fn call(&self, _inv: &mut Invocation) -> anyhow::Result<Reply> {
        self.log.lock().unwrap().push(format!("start {}", self.label));
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.log.lock().unwrap().push(format!("end {}", self.label));
        Ok(Reply::from(self.label))
    }
}

async fn run_briefly(pipeline: &Pipeline) {
    let _ = tokio::time::timeout(Duration::from_millis(400), pipeline.run()).await;
}

#[tokio::test]
async fn test_messages_processed_strictly_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = Arc::new(CommandRegistry::new());
    for label in ["a", "b"] {
        registry
            .register_builder(
                "test",
                CommandBuilder::new(label).handler(Slow {
                    label,
                    log: Arc::clone(&log),
                }),
            )
            .unwrap();
    }

    let transport = Scripted::with_batch(&[".a", ".b"]);
    let pipeline = Pipeline::new(transport.clone(), Dispatcher::new(registry), ".")
        .with_poll_interval(Duration::from_millis(10));
    run_briefly(&pipeline).await;

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["start a", "end a", "start b", "end b"]
    );
    assert_eq!(transport.texts(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_every_matching_pattern_replies_in_registration_order() {
    let registry = Arc::new(CommandRegistry::new());
    registry
        .register_builder(
            "first",
            CommandBuilder::new("greet")
                .pattern(r"(?i)hello.*")
                .run(|_: &mut Invocation| Ok(Reply::from("hi!"))),
        )
        .unwrap();
    registry
        .register_builder(
            "second",
            CommandBuilder::new("wave")
                .pattern(r"(?i)hello there")
                .run(|_: &mut Invocation| Ok(Reply::from("*waves*"))),
        )
        .unwrap();

    let transport = Scripted::with_batch(&["hello there", "goodbye"]);
    let pipeline = Pipeline::new(transport.clone(), Dispatcher::new(registry), ".")
        .with_poll_interval(Duration::from_millis(10));
    run_briefly(&pipeline).await;

    assert_eq!(transport.texts(), vec!["greet: hi!", "wave: *waves*"]);
}

#[tokio::test]
async fn test_multiline_output_goes_to_archive() {
    let registry = Arc::new(CommandRegistry::new());
    registry
        .register_builder(
            "test",
            CommandBuilder::new("table")
                .run(|inv: &mut Invocation| {
                    inv.println("row 1");
                    inv.println("row 2");
                    Ok(Reply::Nothing)
                }),
        )
        .unwrap();
    registry
        .register_builder(
            "test",
            CommandBuilder::new("say").run(|_: &mut Invocation| Ok(Reply::from("short"))),
        )
        .unwrap();

    let archive = Arc::new(MemoryArchive::default());
    let transport = Scripted::with_batch(&[".table", ".say", ".table --help"]);
    let pipeline = Pipeline::new(transport.clone(), Dispatcher::new(registry), ".")
        .with_archive(archive.clone())
        .with_poll_interval(Duration::from_millis(10));
    run_briefly(&pipeline).await;

    assert_eq!(
        transport.texts(),
        vec![
            "https://wiki.example/command/table",
            "short",
            "https://wiki.example/command/table",
        ]
    );

    let uploads = archive.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0], ("command/table".to_string(), "row 1\nrow 2".to_string(), false));
    assert!(uploads[1].1.starts_with("Usage: table"));
    assert!(uploads[1].2);
}

#[tokio::test]
async fn test_multiline_pattern_results_archived_in_registration_order() {
    let registry = Arc::new(CommandRegistry::new());
    registry
        .register_builder(
            "first",
            CommandBuilder::new("weather")
                .pattern(r"(?i)forecast .*")
                .run(|inv: &mut Invocation| {
                    inv.println("monday: rain");
                    inv.println("tuesday: sun");
                    Ok(Reply::Nothing)
                }),
        )
        .unwrap();
    registry
        .register_builder(
            "second",
            CommandBuilder::new("tides")
                .pattern(r"(?i)forecast (?P<place>\w+)")
                .param(Param::new("place"))
                .run(|inv: &mut Invocation| {
                    let place = inv.str("place").unwrap_or_default().to_string();
                    Ok(Reply::Text(format!("{}\nhigh 06:10\nlow 12:25", place)))
                }),
        )
        .unwrap();

    let archive = Arc::new(MemoryArchive::default());
    let transport = Scripted::with_batch(&["forecast Brest"]);
    let pipeline = Pipeline::new(transport.clone(), Dispatcher::new(registry), ".")
        .with_archive(archive.clone())
        .with_poll_interval(Duration::from_millis(10));
    run_briefly(&pipeline).await;

    assert_eq!(
        transport.texts(),
        vec![
            "https://wiki.example/command/weather",
            "https://wiki.example/command/tides",
        ]
    );

    let uploads = archive.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![
            (
                "command/weather".to_string(),
                "monday: rain\ntuesday: sun".to_string(),
                false
            ),
            (
                "command/tides".to_string(),
                "Brest\nhigh 06:10\nlow 12:25".to_string(),
                false
            ),
        ]
    );
}

#[tokio::test]
async fn test_transport_errors_do_not_stop_the_loop() {
    struct Flaky {
        calls: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn poll(&self) -> Result<Vec<Message>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            match *calls {
                1 | 2 => Err(bridgebot::Error::Transport("bridge down".to_string())),
                3 => Ok(vec![Message::new(".say")]),
                _ => Ok(Vec::new()),
            }
        }

        async fn send(&self, message: Message) -> Result<()> {
            self.sent.lock().unwrap().push(message.text);
            Ok(())
        }
    }

    let registry = Arc::new(CommandRegistry::new());
    registry
        .register_builder(
            "test",
            CommandBuilder::new("say").run(|_: &mut Invocation| Ok(Reply::from("back up"))),
        )
        .unwrap();

    let transport = Arc::new(Flaky {
        calls: Mutex::new(0),
        sent: Mutex::new(Vec::new()),
    });
    let pipeline = Pipeline::new(transport.clone(), Dispatcher::new(registry), ".")
        .with_poll_interval(Duration::from_millis(10));
    run_briefly(&pipeline).await;

    assert!(*transport.calls.lock().unwrap() >= 3);
    assert_eq!(transport.sent.lock().unwrap().as_slice(), ["back up"]);
}
