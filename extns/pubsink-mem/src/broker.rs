use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use pubsink_shared::{Error, Result, Topic, TopicOpener};

use crate::FaultInjector;

/// Process local pub/sub broker.
///
/// Cloning is cheap, all clones see the same topics. Topics are created on first open or
/// subscribe and live as long as the broker.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    topics: Arc<RwLock<HashMap<String, Arc<TopicState>>>>,
    faults: Arc<FaultInjector>,
}

/// Shared state of one named topic.
#[derive(Debug)]
struct TopicState {
    name: String,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Bytes>>>,
    /// Number of messages accepted by the topic, delivered or not.
    published: AtomicU64,
}

impl TopicState {
    fn publish(&self, payload: Bytes) {
        self.published.fetch_add(1, Ordering::Relaxed);
        // subscriptions that were dropped are pruned here
        self.subscribers
            .lock()
            .retain(|tx| tx.send(payload.clone()).is_ok());
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The broker behind the process-wide `mem` schema.
    pub fn shared() -> &'static Broker {
        static BROKER: OnceLock<Broker> = OnceLock::new();
        BROKER.get_or_init(Broker::new)
    }

    /// Get the fault injector for this broker.
    pub fn faults(&self) -> &Arc<FaultInjector> {
        &self.faults
    }

    /// A new handle to the named topic, creating the topic if needed.
    pub fn topic(&self, name: &str) -> Result<MemTopic> {
        if name.is_empty() {
            return Err(Error::Open("topic name must not be empty".to_string()));
        }
        Ok(self.handle(name))
    }

    pub(crate) fn handle(&self, name: &str) -> MemTopic {
        MemTopic {
            state: self.topic_state(name),
            faults: Arc::clone(&self.faults),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to the named topic. Only messages published after this call are received.
    /// Empty names are rejected, as when opening a topic.
    pub fn subscribe(&self, name: &str) -> Result<Subscription> {
        if name.is_empty() {
            return Err(Error::Open("topic name must not be empty".to_string()));
        }
        Ok(self.subscription(name))
    }

    pub(crate) fn subscription(&self, name: &str) -> Subscription {
        let state = self.topic_state(name);
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.lock().push(tx);
        Subscription {
            topic: state.name.clone(),
            rx,
        }
    }

    /// Number of messages accepted by the named topic so far.
    pub fn published(&self, name: &str) -> u64 {
        self.topics
            .read()
            .get(name)
            .map_or(0, |t| t.published.load(Ordering::Relaxed))
    }

    /// Whether a topic with that name has been created.
    pub fn contains(&self, name: &str) -> bool {
        self.topics.read().contains_key(name)
    }

    fn topic_state(&self, name: &str) -> Arc<TopicState> {
        if let Some(state) = self.topics.read().get(name) {
            return Arc::clone(state);
        }
        let mut topics = self.topics.write();
        let state = topics.entry(name.to_string()).or_insert_with(|| {
            debug!(topic = name, "Creating in-memory topic");
            Arc::new(TopicState {
                name: name.to_string(),
                subscribers: Mutex::new(Vec::new()),
                published: AtomicU64::new(0),
            })
        });
        Arc::clone(state)
    }
}

#[async_trait]
impl TopicOpener for Broker {
    async fn open_topic(&self, name: &str) -> Result<Arc<dyn Topic>> {
        Ok(Arc::new(self.topic(name)?))
    }
}

/// Handle to an in-memory topic. Shutting a handle down does not affect other handles to the
/// same topic.
#[derive(Debug)]
pub struct MemTopic {
    state: Arc<TopicState>,
    faults: Arc<FaultInjector>,
    closed: AtomicBool,
}

impl MemTopic {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Topic for MemTopic {
    fn name(&self) -> &str {
        &self.state.name
    }

    async fn send(&self, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed(format!("topic {}", self.state.name)));
        }

        let latency = self.faults.publish_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.faults.should_fail_send() {
            return Err(Error::Send(format!(
                "injected send failure on topic {}",
                self.state.name
            )));
        }

        self.state.publish(payload);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        if self.faults.should_fail_shutdown() {
            return Err(Error::Shutdown(format!(
                "injected shutdown failure on topic {}",
                self.state.name
            )));
        }
        Ok(())
    }
}

/// Receiving end of a topic subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Collect up to `count` messages, giving up once `wait` has elapsed.
    pub async fn drain(&mut self, count: usize, wait: Duration) -> Vec<Bytes> {
        let mut messages = Vec::with_capacity(count);
        let deadline = tokio::time::sleep(wait);
        tokio::pin!(deadline);
        while messages.len() < count {
            tokio::select! {
                biased;

                _ = &mut deadline => {
                    debug!(topic = %self.topic, msg_count = messages.len(), "Timed out draining subscription");
                    break;
                }
                maybe_msg = self.rx.recv() => {
                    let Some(msg) = maybe_msg else {
                        break;
                    };
                    messages.push(msg);
                }
            }
        }
        messages
    }
}
