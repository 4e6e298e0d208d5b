use tokio::runtime::Handle;
use tracing::info;

use pubsink_shared::TopicOpener;

use crate::config::Settings;
use crate::resolver::SinkConfig;
use crate::sink::{LogSink, Publisher, Release};
use crate::{Error, Result};

/// Publishes log records to a topic opened by name. Owns the topic; closing the sink shuts it
/// down.
#[derive(Debug)]
pub struct TopicSink {
    publisher: Publisher,
}

impl TopicSink {
    /// Open the configured topic through `opener`. Must be called from within a tokio runtime,
    /// the publishes of the sink run on it.
    pub async fn open(
        config: SinkConfig,
        opener: &dyn TopicOpener,
        settings: &Settings,
    ) -> Result<Self> {
        let runtime = current_runtime()?;
        let topic = opener.open_topic(&config.topic).await.map_err(|e| {
            Error::TransportOpen(format!("opening topic {:?}: {e}", config.topic))
        })?;

        info!(
            schema = %config.schema,
            topic = %config.topic,
            publish_timeout = %config.publish_timeout,
            "Topic sink opened"
        );
        Ok(Self {
            publisher: Publisher::new(config, topic, runtime, settings),
        })
    }

    pub fn config(&self) -> &SinkConfig {
        self.publisher.config()
    }

    pub fn is_closed(&self) -> bool {
        self.publisher.is_closed()
    }
}

impl LogSink for TopicSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.publisher.publish(buf)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.publisher.begin_close() {
            return Ok(());
        }
        self.publisher.drain().await;

        let mut release = Release::default();
        release.record("topic", self.publisher.topic().shutdown().await);
        info!(topic = %self.config().topic, "Topic sink closed");
        release.finish()
    }
}

pub(crate) fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        Error::TransportOpen(format!("log sinks must be opened within a tokio runtime: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pubsink_mem::Broker;

    use super::*;
    use crate::resolver::{Dialect, resolve};

    async fn open(broker: &Broker, url: &str) -> Result<TopicSink> {
        let settings = Settings::default();
        let config = resolve(&url::Url::parse(url)?, Dialect::Topic, &settings)?;
        TopicSink::open(config, broker, &settings).await
    }

    #[tokio::test]
    async fn test_write_publishes_and_reports_length() {
        let broker = Broker::new();
        let mut subscription = broker.subscribe("logs").unwrap();
        let sink = open(&broker, "mem://logs").await.unwrap();

        assert_eq!(sink.write(b"{\"msg\":\"hello\"}\n").unwrap(), 16);
        assert_eq!(sink.write(b"").unwrap(), 0);
        sink.sync().unwrap();

        let messages = subscription.drain(2, Duration::from_secs(1)).await;
        assert_eq!(messages.len(), 2);
        assert!(
            messages
                .iter()
                .any(|m| m.as_ref() == b"{\"msg\":\"hello\"}\n")
        );
        assert!(messages.iter().any(|m| m.is_empty()));
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_does_not_wait_for_delivery() {
        let broker = Broker::new();
        broker.faults().set_publish_latency(Duration::from_millis(200));
        let sink = open(&broker, "mem://slow").await.unwrap();

        let start = Instant::now();
        for _ in 0..50 {
            assert_eq!(sink.write(b"record").unwrap(), 6);
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let broker = Broker::new();
        let sink = open(&broker, "mem://logs").await.unwrap();
        sink.close().await.unwrap();

        assert!(sink.is_closed());
        assert_eq!(sink.write(b"late").unwrap_err(), Error::Closed);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_drains_in_flight_publishes() {
        let broker = Broker::new();
        broker.faults().set_publish_latency(Duration::from_millis(20));
        let sink = open(&broker, "mem://drained").await.unwrap();

        for _ in 0..5 {
            sink.write(b"record").unwrap();
        }
        sink.close().await.unwrap();
        assert_eq!(broker.published("drained"), 5);
    }

    #[tokio::test]
    async fn test_missed_deadline_drops_records() {
        let broker = Broker::new();
        broker.faults().set_publish_latency(Duration::from_millis(50));
        let mut subscription = broker.subscribe("late").unwrap();
        let sink = open(&broker, "mem://late?publishTimeout=1ns").await.unwrap();

        for _ in 0..10 {
            assert_eq!(sink.write(b"record").unwrap(), 6);
        }
        sink.close().await.unwrap();

        let messages = subscription.drain(10, Duration::from_millis(100)).await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_send_failures_are_not_reported_to_writer() {
        let broker = Broker::new();
        broker.faults().fail_sends(3);
        let mut subscription = broker.subscribe("flaky").unwrap();
        let sink = open(&broker, "mem://flaky").await.unwrap();

        for _ in 0..5 {
            assert!(sink.write(b"record").is_ok());
        }
        sink.close().await.unwrap();

        let messages = subscription.drain(5, Duration::from_millis(100)).await;
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_failure_is_reported_once() {
        let broker = Broker::new();
        broker.faults().fail_shutdowns(1);
        let sink = open(&broker, "mem://logs").await.unwrap();

        let err = sink.close().await.unwrap_err();
        assert!(matches!(&err, Error::Close(msg) if msg.starts_with("topic:")));
        assert!(sink.close().await.is_ok());
        assert_eq!(sink.write(b"x").unwrap_err(), Error::Closed);
    }

    #[tokio::test]
    async fn test_open_failure_is_transport_error() {
        let broker = Broker::new();
        let err = open(&broker, "mem://").await.unwrap_err();
        assert!(matches!(err, Error::TransportOpen(_)));
    }
}
