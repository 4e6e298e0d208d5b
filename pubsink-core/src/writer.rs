//! Plugs a [Sink] into `tracing-subscriber` as the destination of a formatting layer.
//!
//! ```no_run
//! # async fn example() -> pubsink_core::Result<()> {
//! use std::sync::Arc;
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::util::SubscriberInitExt;
//!
//! let registry = pubsink_core::SinkRegistry::init(
//!     pubsink_core::Settings::load()?,
//!     pubsink_core::default_schemas(),
//! )?;
//! let sink = Arc::new(registry.open("mem://logs").await?);
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer().json().with_writer(pubsink_core::SinkWriter::new(sink)))
//!     .init();
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::Arc;

use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::OptionalWriter;

use crate::sink::{DELIVERY_TARGET, LogSink, Sink};

/// [MakeWriter] over a shared sink. Every formatted event becomes one publish.
///
/// Events reporting failed publishes are not written to the sink, a failing transport would
/// otherwise keep feeding its own failures back into itself.
#[derive(Debug, Clone)]
pub struct SinkWriter {
    sink: Arc<Sink>,
}

impl SinkWriter {
    pub fn new(sink: Arc<Sink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }
}

/// Writer handed out per event.
#[derive(Debug)]
pub struct RecordWriter<'a> {
    sink: &'a Sink,
}

impl io::Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.sink.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.sink.sync()?)
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = OptionalWriter<RecordWriter<'a>>;

    fn make_writer(&'a self) -> Self::Writer {
        OptionalWriter::some(RecordWriter { sink: &self.sink })
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        if meta.target() == DELIVERY_TARGET {
            return OptionalWriter::none();
        }
        self.make_writer()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use pubsink_mem::Broker;
    use tracing::{info, warn};

    use super::*;
    use crate::config::Settings;
    use crate::registry::{Schema, SinkRegistry};

    async fn open_sink(broker: &Broker, url: &str) -> Arc<Sink> {
        let registry =
            SinkRegistry::init(Settings::default(), [Schema::topic("mem", Arc::new(broker.clone()))])
                .unwrap();
        Arc::new(registry.open(url).await.unwrap())
    }

    #[tokio::test]
    async fn test_events_are_published_as_json() {
        let broker = Broker::new();
        let mut subscription = broker.subscribe("app").unwrap();
        let sink = open_sink(&broker, "mem://app").await;

        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_writer(SinkWriter::new(Arc::clone(&sink)))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            info!(request_id = 7, "handled request");
        });

        let messages = subscription.drain(1, Duration::from_secs(1)).await;
        assert_eq!(messages.len(), 1);
        let record: serde_json::Value = serde_json::from_slice(&messages[0]).unwrap();
        assert_eq!(record["message"], "handled request");
        assert_eq!(record["request_id"], 7);
        assert_eq!(record["level"], "INFO");
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_delivery_failures_are_not_fed_back() {
        let broker = Broker::new();
        let mut subscription = broker.subscribe("app").unwrap();
        let sink = open_sink(&broker, "mem://app").await;

        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(SinkWriter::new(Arc::clone(&sink)))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            warn!(target: DELIVERY_TARGET, "Dropping log record");
            info!("kept");
        });

        let messages = subscription.drain(2, Duration::from_millis(200)).await;
        assert_eq!(messages.len(), 1);
        assert!(String::from_utf8_lossy(&messages[0]).contains("kept"));
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_after_close_are_broken_pipe() {
        let broker = Broker::new();
        let sink = open_sink(&broker, "mem://app").await;
        sink.close().await.unwrap();

        let writer = SinkWriter::new(sink);
        let err = writer.make_writer().write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(writer.make_writer().flush().is_ok());
    }
}
