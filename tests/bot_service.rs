//! End-to-end tests: transport → BotService → router → completion API → transport.
//!
//! The completion API is a wiremock server; the transport is an in-memory queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use signal_relay::chatbot::{
    BotService, ChatTurn, CommandRouter, CompletionClient, Handlers, InboundMessage, ModelSelection,
    OutboundMessage, SessionStore, Transport, TransportError,
};

/// Serves queued batches of inbound messages and records replies.
struct MemoryTransport {
    batches: Mutex<VecDeque<Result<Vec<InboundMessage>, TransportError>>>,
    sent: mpsc::UnboundedSender<OutboundMessage>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&self) -> Result<Vec<InboundMessage>, TransportError> {
        self.batches.lock().await.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.sent.send(message).ok();
        Ok(())
    }
}

struct Harness {
    _server: MockServer,
    sessions: Arc<SessionStore>,
    replies: mpsc::UnboundedReceiver<OutboundMessage>,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start(
        batches: Vec<Result<Vec<InboundMessage>, TransportError>>,
        reply_delay: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(move |req: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let last = body["messages"]
                    .as_array()
                    .and_then(|m| m.last())
                    .and_then(|m| m["content"].as_str())
                    .unwrap_or("")
                    .to_string();
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": format!("re: {last}")}}]}))
                    .set_delay(reply_delay)
            })
            .mount(&server)
            .await;

        let (sent, replies) = mpsc::unbounded_channel();
        let transport = Arc::new(MemoryTransport {
            batches: Mutex::new(batches.into_iter().collect()),
            sent,
        });

        let sessions = Arc::new(SessionStore::new());
        let client = Arc::new(CompletionClient::new(&server.uri(), Duration::from_secs(5)).unwrap());
        let handlers = Handlers::new(sessions.clone(), client, ModelSelection::Fixed("m1".into()));
        let router = Arc::new(CommandRouter::new(handlers));

        let service = BotService::new(transport, router, Duration::from_millis(10))
            .with_idle_timeout(idle_timeout);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(service.run(async {
            stopped.await.ok();
        }));

        Self {
            _server: server,
            sessions,
            replies,
            stop: Some(stop),
            task,
        }
    }

    async fn next_reply(&mut self) -> OutboundMessage {
        tokio::time::timeout(Duration::from_secs(5), self.replies.recv())
            .await
            .expect("timed out waiting for reply")
            .expect("reply channel closed")
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("service did not stop")
            .unwrap();
    }
}

fn msg(sender: &str, text: &str) -> InboundMessage {
    InboundMessage::new(sender, text)
}

#[tokio::test]
async fn test_chat_round_trip() {
    let mut harness = Harness::start(
        vec![Ok(vec![msg("+100", "chat hello")])],
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await;

    let reply = harness.next_reply().await;
    assert_eq!(reply, OutboundMessage { recipient: "+100".into(), text: "re: hello".into() });
    assert_eq!(
        harness.sessions.get("+100").await,
        vec![ChatTurn::user("hello"), ChatTurn::assistant("re: hello")]
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_same_sender_keeps_receipt_order() {
    let mut harness = Harness::start(
        vec![Ok(vec![msg("+100", "one"), msg("+100", "two"), msg("+100", "three")])],
        Duration::from_millis(30),
        Duration::from_secs(60),
    )
    .await;

    let mut texts = Vec::new();
    for _ in 0..3 {
        texts.push(harness.next_reply().await.text);
    }
    assert_eq!(texts, vec!["re: one", "re: two", "re: three"]);

    let history: Vec<_> = harness.sessions.get("+100").await.into_iter().map(|t| t.content).collect();
    assert_eq!(history, vec!["one", "re: one", "two", "re: two", "three", "re: three"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_slow_sender_does_not_block_others() {
    let mut harness = Harness::start(
        vec![Ok(vec![msg("+100", "a1"), msg("+100", "a2"), msg("+200", "help")])],
        Duration::from_millis(300),
        Duration::from_secs(60),
    )
    .await;

    // Help needs no API call, so it overtakes the slow sender's queue.
    let first = harness.next_reply().await;
    assert_eq!(first.recipient, "+200");
    assert!(first.text.starts_with("Available commands:"));

    assert_eq!(harness.next_reply().await.text, "re: a1");
    assert_eq!(harness.next_reply().await.text, "re: a2");

    harness.stop().await;
}

#[tokio::test]
async fn test_receive_errors_do_not_stop_loop() {
    let mut harness = Harness::start(
        vec![
            Err(TransportError::Http("connection refused".into())),
            Err(TransportError::Status { status: 500, body: String::new() }),
            Ok(vec![msg("+100", "still here")]),
        ],
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await;

    assert_eq!(harness.next_reply().await.text, "re: still here");
    harness.stop().await;
}

#[tokio::test]
async fn test_idle_worker_is_replaced() {
    let mut harness = Harness::start(
        vec![
            Ok(vec![msg("+100", "before")]),
            Ok(Vec::new()),
            Ok(Vec::new()),
            Ok(Vec::new()),
            Ok(Vec::new()),
            Ok(Vec::new()),
            Ok(vec![msg("+100", "after")]),
        ],
        Duration::ZERO,
        Duration::from_millis(20),
    )
    .await;

    assert_eq!(harness.next_reply().await.text, "re: before");
    assert_eq!(harness.next_reply().await.text, "re: after");

    let history: Vec<_> = harness.sessions.get("+100").await.into_iter().map(|t| t.content).collect();
    assert_eq!(history, vec!["before", "re: before", "after", "re: after"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_empty_message_gets_prompt() {
    let mut harness = Harness::start(vec![Ok(vec![msg("+100", "")])], Duration::ZERO, Duration::from_secs(60)).await;

    assert_eq!(
        harness.next_reply().await.text,
        "Please provide a message to chat with the AI."
    );
    assert!(harness.sessions.get("+100").await.is_empty());

    harness.stop().await;
}
