use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use pubsink_shared::{Connection, Error, Result, ServiceClient, ServiceConnector, Topic};

use crate::{Broker, FaultInjector, Subscription};

/// In-process stand-in for a managed pub/sub service.
///
/// The emulator answers on its own [address](Emulator::addr); only connections dialed to that
/// address are accepted. Topics are stored under their full `projects/{p}/topics/{t}` path.
#[derive(Debug, Clone)]
pub struct Emulator {
    addr: String,
    broker: Broker,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        let addr = format!("emulator-{}", Uuid::new_v4().simple());
        info!(addr, "Starting pub/sub emulator");
        Self {
            addr,
            broker: Broker::new(),
        }
    }

    /// Address to pass as the endpoint override of a managed-service sink.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn faults(&self) -> &Arc<FaultInjector> {
        self.broker.faults()
    }

    /// Subscribe to a topic of a project.
    pub fn subscribe(&self, project_id: &str, topic: &str) -> Subscription {
        self.broker.subscription(&topic_path(project_id, topic))
    }

    /// Number of messages accepted by a topic of a project.
    pub fn published(&self, project_id: &str, topic: &str) -> u64 {
        self.broker.published(&topic_path(project_id, topic))
    }
}

/// Fully qualified name of a topic.
pub fn topic_path(project_id: &str, topic: &str) -> String {
    format!("projects/{project_id}/topics/{topic}")
}

#[async_trait]
impl ServiceConnector for Emulator {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn Connection>> {
        if addr != self.addr {
            return Err(Error::Connection {
                server: addr.to_string(),
                error: "no emulator listening on this address".to_string(),
            });
        }
        Ok(Arc::new(EmulatorConnection {
            addr: addr.to_string(),
            faults: Arc::clone(self.broker.faults()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn new_client(
        &self,
        project_id: &str,
        connection: Option<Arc<dyn Connection>>,
    ) -> Result<Box<dyn ServiceClient>> {
        if project_id.is_empty() {
            return Err(Error::Open("project id must not be empty".to_string()));
        }
        if let Some(conn) = &connection {
            if conn.addr() != self.addr {
                return Err(Error::Connection {
                    server: conn.addr().to_string(),
                    error: format!("connection does not lead to emulator {}", self.addr),
                });
            }
        }
        Ok(Box::new(EmulatorClient {
            project_id: project_id.to_string(),
            broker: self.broker.clone(),
            connection,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Plain connection to the emulator.
#[derive(Debug)]
struct EmulatorConnection {
    addr: String,
    faults: Arc<FaultInjector>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for EmulatorConnection {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.faults.should_fail_connection_close() {
            return Err(Error::Close(format!(
                "injected connection close failure on {}",
                self.addr
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct EmulatorClient {
    project_id: String,
    broker: Broker,
    connection: Option<Arc<dyn Connection>>,
    closed: AtomicBool,
}

#[async_trait]
impl ServiceClient for EmulatorClient {
    fn topic(&self, name: &str) -> Arc<dyn Topic> {
        Arc::new(self.broker.handle(&topic_path(&self.project_id, name)))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(
            project_id = %self.project_id,
            via = ?self.connection.as_ref().map(|c| c.addr()),
            "Closing emulator client"
        );
        if self.broker.faults().should_fail_client_close() {
            return Err(Error::Close(format!(
                "injected client close failure for project {}",
                self.project_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_publish_through_dialed_connection() {
        let emulator = Emulator::new();
        let mut sub = emulator.subscribe("proj", "logs");

        let conn = emulator.dial(emulator.addr()).await.unwrap();
        let client = emulator.new_client("proj", Some(conn)).await.unwrap();
        let topic = client.topic("logs");
        assert_eq!(topic.name(), "projects/proj/topics/logs");

        topic.send(Bytes::from("hello")).await.unwrap();
        let messages = sub.drain(1, Duration::from_secs(1)).await;
        assert_eq!(messages, vec![Bytes::from("hello")]);
        assert_eq!(emulator.published("proj", "logs"), 1);
    }

    #[tokio::test]
    async fn test_dial_unknown_address_fails() {
        let emulator = Emulator::new();
        let err = emulator.dial("localhost:1").await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_client_rejects_foreign_connection() {
        let emulator = Emulator::new();
        let other = Emulator::new();
        let conn = other.dial(other.addr()).await.unwrap();
        let err = emulator.new_client("proj", Some(conn)).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_client_without_connection_uses_default_endpoint() {
        let emulator = Emulator::new();
        let client = emulator.new_client("proj", None).await.unwrap();
        assert!(client.topic("t").send(Bytes::from("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_project_is_rejected() {
        let emulator = Emulator::new();
        assert!(matches!(
            emulator.new_client("", None).await.unwrap_err(),
            Error::Open(_)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_injectable() {
        let emulator = Emulator::new();
        emulator.faults().fail_client_closes(1);
        emulator.faults().fail_connection_closes(1);

        let conn = emulator.dial(emulator.addr()).await.unwrap();
        let client = emulator
            .new_client("proj", Some(Arc::clone(&conn)))
            .await
            .unwrap();

        assert!(matches!(conn.close().await, Err(Error::Close(_))));
        assert!(conn.close().await.is_ok());
        assert!(matches!(client.close().await, Err(Error::Close(_))));
        assert!(client.close().await.is_ok());
    }
}
