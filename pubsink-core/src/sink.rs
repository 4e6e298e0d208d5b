use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use pubsink_shared::Topic;

use crate::config::Settings;
use crate::resolver::SinkConfig;
use crate::{Error, Result};

pub use service::ServiceSink;
pub use topic::TopicSink;

/// Sink over a topic of an in-process or simple transport.
mod topic;

/// Sink over a topic of a managed service, owning the client and the optional connection.
mod service;

/// Target of the events reporting failed publishes. Writers built by
/// [SinkWriter](crate::SinkWriter) never feed these back into a sink.
pub const DELIVERY_TARGET: &str = "pubsink::delivery";

/// The capability set a logging backend needs from a destination of encoded log records.
#[trait_variant::make(Send)]
pub trait LogSink {
    /// Hand one encoded record over to the transport. Never waits for the delivery, and never
    /// fails because of the transport: the full length is reported as accepted while the sink
    /// is open. Fails with [Error::Closed] after [close](LogSink::close).
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// No-op, there is nothing to flush at this layer.
    fn sync(&self) -> Result<()>;

    /// Close the sink and release everything it owns. Only the first call does any work.
    async fn close(&self) -> Result<()>;
}

/// A log sink built from a sink URL, one variant per dialect.
#[derive(Debug)]
pub enum Sink {
    Topic(TopicSink),
    Service(ServiceSink),
}

impl Sink {
    /// The configuration the sink was resolved with.
    pub fn config(&self) -> &SinkConfig {
        match self {
            Sink::Topic(sink) => sink.config(),
            Sink::Service(sink) => sink.config(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Sink::Topic(sink) => sink.is_closed(),
            Sink::Service(sink) => sink.is_closed(),
        }
    }
}

impl LogSink for Sink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        match self {
            Sink::Topic(sink) => sink.write(buf),
            Sink::Service(sink) => sink.write(buf),
        }
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        match self {
            Sink::Topic(sink) => sink.close().await,
            Sink::Service(sink) => sink.close().await,
        }
    }
}

/// Write path shared by every sink variant.
///
/// Each write spawns a publish task on the runtime the sink was built on. The task is bounded
/// by the publish timeout and is never joined by the writer; there is no ordering between
/// writes and no retry. The tracker only exists so close can wait for the in-flight tasks.
#[derive(Debug)]
pub(crate) struct Publisher {
    config: SinkConfig,
    topic: Arc<dyn Topic>,
    publish_timeout: Duration,
    drain_on_close: bool,
    tracker: TaskTracker,
    runtime: Handle,
    closed: AtomicBool,
}

impl Publisher {
    pub(crate) fn new(
        config: SinkConfig,
        topic: Arc<dyn Topic>,
        runtime: Handle,
        settings: &Settings,
    ) -> Self {
        if config.publish_timeout.is_negative() {
            warn!(
                topic = topic.name(),
                publish_timeout = %config.publish_timeout,
                "Negative publish timeout, publishes that do not complete immediately are dropped"
            );
        }
        Self {
            publish_timeout: config.publish_timeout.to_timeout(),
            config,
            topic,
            drain_on_close: settings.drain_on_close,
            tracker: TaskTracker::new(),
            runtime,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub(crate) fn topic(&self) -> &Arc<dyn Topic> {
        &self.topic
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let topic = Arc::clone(&self.topic);
        let payload = Bytes::copy_from_slice(buf);
        let timeout = self.publish_timeout;
        self.tracker.spawn_on(
            async move {
                let err = match tokio::time::timeout(timeout, topic.send(payload)).await {
                    Ok(Ok(())) => return,
                    Ok(Err(e)) => Error::Delivery(e.to_string()),
                    Err(_) => Error::Delivery(format!("publish deadline of {timeout:?} exceeded")),
                };
                warn!(target: DELIVERY_TARGET, topic = topic.name(), %err, "Dropping log record");
            },
            &self.runtime,
        );

        Ok(buf.len())
    }

    /// Move to the closed state. Returns `false` if the sink was closed already.
    pub(crate) fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Wait for the publishes that are still in flight.
    pub(crate) async fn drain(&self) {
        self.tracker.close();
        if !self.drain_on_close {
            return;
        }
        debug!(
            topic = self.topic.name(),
            in_flight = self.tracker.len(),
            "Waiting for in-flight publishes"
        );
        self.tracker.wait().await;
    }
}

/// Collects the outcome of the release steps of a close. Every step runs; the first failure is
/// what close reports.
#[derive(Debug, Default)]
pub(crate) struct Release {
    first_error: Option<Error>,
}

impl Release {
    pub(crate) fn record(&mut self, resource: &str, result: pubsink_shared::Result<()>) {
        let Err(e) = result else {
            return;
        };
        let err = Error::Close(format!("{resource}: {e}"));
        warn!(%err, "Failed to release sink resource");
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        self.first_error.map_or(Ok(()), Err)
    }
}
