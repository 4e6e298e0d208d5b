use std::sync::Arc;

use tracing::{info, warn};

use pubsink_shared::{Connection, ServiceClient, ServiceConnector};

use crate::config::Settings;
use crate::resolver::SinkConfig;
use crate::sink::topic::current_runtime;
use crate::sink::{LogSink, Publisher, Release};
use crate::{Error, Result};

/// Publishes log records to a topic of a managed pub/sub service.
///
/// Besides the topic handle the sink owns the project client and, when the sink URL carried an
/// endpoint override, the plain connection the client was created on. Close releases them in
/// the order connection, topic, client.
#[derive(Debug)]
pub struct ServiceSink {
    publisher: Publisher,
    client: Box<dyn ServiceClient>,
    connection: Option<Arc<dyn Connection>>,
}

impl ServiceSink {
    /// Build the client (dialing the endpoint override first, if any) and open the configured
    /// topic. Whatever was acquired before a failure is released again.
    pub async fn open(
        config: SinkConfig,
        connector: &dyn ServiceConnector,
        settings: &Settings,
    ) -> Result<Self> {
        let runtime = current_runtime()?;
        let project_id = config.project_id.as_deref().ok_or_else(|| {
            Error::Configuration(format!("sink url for topic {:?} has no project", config.topic))
        })?;

        let connection = match config.endpoint.as_deref() {
            Some(addr) => Some(connector.dial(addr).await.map_err(|e| {
                Error::TransportOpen(format!("dialing endpoint {addr}: {e}"))
            })?),
            None => None,
        };

        let client = match connector.new_client(project_id, connection.clone()).await {
            Ok(client) => client,
            Err(e) => {
                if let Some(conn) = &connection {
                    if let Err(close_err) = conn.close().await {
                        warn!(addr = conn.addr(), error = %close_err, "Failed to close connection of failed sink");
                    }
                }
                return Err(Error::TransportOpen(format!(
                    "creating client for project {project_id}: {e}"
                )));
            }
        };

        let topic = client.topic(&config.topic);
        info!(
            schema = %config.schema,
            project_id,
            topic = %config.topic,
            endpoint = ?config.endpoint,
            publish_timeout = %config.publish_timeout,
            "Service sink opened"
        );
        Ok(Self {
            publisher: Publisher::new(config, topic, runtime, settings),
            client,
            connection,
        })
    }

    pub fn config(&self) -> &SinkConfig {
        self.publisher.config()
    }

    pub fn is_closed(&self) -> bool {
        self.publisher.is_closed()
    }
}

impl LogSink for ServiceSink {
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
        if let Some(conn) = &self.connection {
            release.record("connection", conn.close().await);
        }
        release.record("topic", self.publisher.topic().shutdown().await);
        release.record("client", self.client.close().await);
        info!(topic = %self.config().topic, "Service sink closed");
        release.finish()
    }
}
