//! Pub/sub capabilities consumed by the log sinks.
//!
//! A sink never talks to a broker directly. It is handed (or builds, through a connector) an
//! open [Topic] and owns it until it is closed. Two shapes of transport exist:
//! - in-process/simple transports, where a [TopicOpener] turns a topic name into a [Topic].
//! - managed services, where a [ServiceConnector] creates a project scoped [ServiceClient],
//!   optionally on top of an explicit plain-text [Connection] to an alternate endpoint.
//!
//! The traits use `async_trait` to enable object safety, allowing usage as `Arc<dyn Topic>`
//! which is what the sink's publish tasks hold on to.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// An open, writable channel to a named topic.
#[async_trait]
pub trait Topic: Send + Sync + Debug {
    /// Name of the topic, as understood by the transport.
    fn name(&self) -> &str;

    /// Publish one message. Returns once the transport has accepted (or rejected) the message.
    /// Callers bound this with their own deadline.
    async fn send(&self, payload: Bytes) -> Result<()>;

    /// Stop accepting new messages and flush whatever the transport still holds.
    async fn shutdown(&self) -> Result<()>;
}

/// Opens topics of an in-process or otherwise simple transport.
#[async_trait]
pub trait TopicOpener: Send + Sync + Debug {
    async fn open_topic(&self, name: &str) -> Result<Arc<dyn Topic>>;
}

/// A transport level connection, e.g. to a local test broker.
#[async_trait]
pub trait Connection: Send + Sync + Debug {
    /// Address the connection was dialed to.
    fn addr(&self) -> &str;

    async fn close(&self) -> Result<()>;
}

/// A project scoped client of a managed pub/sub service.
#[async_trait]
pub trait ServiceClient: Send + Sync + Debug {
    /// Handle to the named topic of the client's project. Existence is checked by the service
    /// on publish, not here.
    fn topic(&self, name: &str) -> Arc<dyn Topic>;

    async fn close(&self) -> Result<()>;
}

/// Entry point to a managed pub/sub service.
#[async_trait]
pub trait ServiceConnector: Send + Sync + Debug {
    /// Dial a plain (no TLS) connection to an alternate endpoint.
    async fn dial(&self, addr: &str) -> Result<Arc<dyn Connection>>;

    /// Create a client for `project_id`. When `connection` is `None` the connector uses its
    /// default, credentialed endpoint.
    async fn new_client(
        &self,
        project_id: &str,
        connection: Option<Arc<dyn Connection>>,
    ) -> Result<Box<dyn ServiceClient>>;
}
