//! Bot service - polls the transport and feeds messages to the router.
//!
//! Messages are queued per sender. Each active sender has one worker task that
//! handles its messages strictly in arrival order, while different senders are
//! handled in parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::chatbot::message::{InboundMessage, OutboundMessage};
use crate::chatbot::router::CommandRouter;
use crate::chatbot::transport::Transport;

/// Upper bound for the wait between failed receive attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How long a sender's worker waits for another message before exiting.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub struct BotService<T: Transport + 'static> {
    transport: Arc<T>,
    router: Arc<CommandRouter>,
    poll_interval: Duration,
    idle_timeout: Duration,
    queues: HashMap<String, UnboundedSender<InboundMessage>>,
}

impl<T: Transport + 'static> BotService<T> {
    pub fn new(transport: Arc<T>, router: Arc<CommandRouter>, poll_interval: Duration) -> Self {
        Self {
            transport,
            router,
            poll_interval,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            queues: HashMap::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Run the receive loop until `shutdown` completes.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = self.poll_interval;

        loop {
            let received = tokio::select! {
                biased;

                _ = &mut shutdown => break,
                result = self.transport.receive() => result,
            };

            let wait = match received {
                Ok(messages) => {
                    for message in messages {
                        self.enqueue(message);
                    }
                    backoff = self.poll_interval;
                    self.poll_interval
                }
                Err(e) => {
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    warn!("Receive failed: {e} (retrying in {}ms)", backoff.as_millis());
                    backoff
                }
            };

            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = sleep(wait) => {}
            }
        }

        info!("🛑 Bot service stopped");
    }

    /// Hand a message to its sender's worker, starting one if needed.
    fn enqueue(&mut self, message: InboundMessage) {
        info!(
            "📨 Message from {} at {}: \"{}\"",
            message.sender,
            message.received_at.format("%Y-%m-%d %H:%M:%S"),
            message.preview()
        );

        let message = match self.queues.get(&message.sender) {
            Some(queue) => match queue.send(message) {
                Ok(()) => return,
                // Worker went idle and closed its queue.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        self.queues.retain(|_, queue| !queue.is_closed());

        let (queue, rx) = mpsc::unbounded_channel();
        let sender = message.sender.clone();
        queue.send(message).ok();
        self.queues.insert(sender, queue);

        tokio::spawn(sender_worker(
            self.transport.clone(),
            self.router.clone(),
            rx,
            self.idle_timeout,
        ));
    }
}

async fn sender_worker<T: Transport>(
    transport: Arc<T>,
    router: Arc<CommandRouter>,
    mut rx: UnboundedReceiver<InboundMessage>,
    idle_timeout: Duration,
) {
    loop {
        match timeout(idle_timeout, rx.recv()).await {
            Ok(Some(message)) => process(transport.as_ref(), &router, message).await,
            Ok(None) => return,
            Err(_) => {
                // Refuse new messages, then finish anything already queued.
                rx.close();
                while let Ok(message) = rx.try_recv() {
                    process(transport.as_ref(), &router, message).await;
                }
                return;
            }
        }
    }
}

async fn process<T: Transport>(transport: &T, router: &CommandRouter, message: InboundMessage) {
    let reply = router.dispatch(&message.sender, &message.text).await;
    let outbound = OutboundMessage {
        recipient: message.sender,
        text: reply,
    };

    if let Err(e) = transport.send(outbound).await {
        warn!("Failed to send reply: {e}");
    }
}
