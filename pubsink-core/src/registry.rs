//! Schema registration and sink construction.
//!
//! A [SinkRegistry] maps URL schemes to [SinkFactory]s. Opening a sink URL parses it, looks up
//! the factory of its scheme and lets the factory resolve the URL in its dialect and acquire
//! the transport resources. The process-wide registry is initialized once, at startup, through
//! [init_global].

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use pubsink_mem::Broker;
use pubsink_shared::{ServiceConnector, TopicOpener};

use crate::config::Settings;
use crate::resolver::{self, Dialect};
use crate::sink::{ServiceSink, Sink, TopicSink};
use crate::{Error, Result};

/// Schema of the in-process transport.
pub const MEM_SCHEMA: &str = "mem";

/// Conventional schema of a managed pub/sub service.
pub const PUBSUB_SCHEMA: &str = "pubsub";

static GLOBAL_REGISTRY: OnceLock<SinkRegistry> = OnceLock::new();

/// Builds sinks for the URLs of one schema.
#[async_trait]
pub trait SinkFactory: Send + Sync + Debug {
    /// Addressing convention the factory resolves URLs with.
    fn dialect(&self) -> Dialect;

    async fn build(&self, url: &Url, settings: &Settings) -> Result<Sink>;
}

/// Factory of sinks over topics opened by name.
#[derive(Debug, Clone)]
pub struct TopicSinkFactory {
    opener: Arc<dyn TopicOpener>,
}

impl TopicSinkFactory {
    pub fn new(opener: Arc<dyn TopicOpener>) -> Self {
        Self { opener }
    }
}

#[async_trait]
impl SinkFactory for TopicSinkFactory {
    fn dialect(&self) -> Dialect {
        Dialect::Topic
    }

    async fn build(&self, url: &Url, settings: &Settings) -> Result<Sink> {
        let config = resolver::resolve(url, self.dialect(), settings)?;
        let sink = TopicSink::open(config, self.opener.as_ref(), settings).await?;
        Ok(Sink::Topic(sink))
    }
}

/// Factory of sinks over topics of a managed service.
#[derive(Debug, Clone)]
pub struct ServiceSinkFactory {
    connector: Arc<dyn ServiceConnector>,
}

impl ServiceSinkFactory {
    pub fn new(connector: Arc<dyn ServiceConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl SinkFactory for ServiceSinkFactory {
    fn dialect(&self) -> Dialect {
        Dialect::Service
    }

    async fn build(&self, url: &Url, settings: &Settings) -> Result<Sink> {
        let config = resolver::resolve(url, self.dialect(), settings)?;
        let sink = ServiceSink::open(config, self.connector.as_ref(), settings).await?;
        Ok(Sink::Service(sink))
    }
}

/// A URL scheme paired with the factory building its sinks.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    factory: Arc<dyn SinkFactory>,
}

impl Schema {
    pub fn new(name: impl Into<String>, factory: Arc<dyn SinkFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    /// A schema of the topic dialect, `name://topic/path`.
    pub fn topic(name: impl Into<String>, opener: Arc<dyn TopicOpener>) -> Self {
        Self::new(name, Arc::new(TopicSinkFactory::new(opener)))
    }

    /// A schema of the managed-service dialect, `name://projects/{p}/topics/{t}`.
    pub fn service(name: impl Into<String>, connector: Arc<dyn ServiceConnector>) -> Self {
        Self::new(name, Arc::new(ServiceSinkFactory::new(connector)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &Arc<dyn SinkFactory> {
        &self.factory
    }
}

/// Schemas available without any configuration: `mem` over the process-wide broker.
pub fn default_schemas() -> Vec<Schema> {
    vec![Schema::topic(MEM_SCHEMA, Arc::new(Broker::shared().clone()))]
}

/// URL schemes are case-insensitive; stored lowercase. A scheme starts with a letter followed
/// by letters, digits, `+`, `-` or `.`.
fn normalize_schema_name(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(Error::Registration(format!(
            "{name:?} is not a valid url scheme"
        )));
    }
    Ok(name.to_ascii_lowercase())
}

/// Registered schemas and the settings their sinks are opened with.
#[derive(Debug, Default)]
pub struct SinkRegistry {
    settings: Settings,
    factories: HashMap<String, Arc<dyn SinkFactory>>,
}

impl SinkRegistry {
    /// An empty registry.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            factories: HashMap::new(),
        }
    }

    /// A registry with all of `schemas` registered. Fails without a registry on the first
    /// duplicate or invalid schema.
    pub fn init(settings: Settings, schemas: impl IntoIterator<Item = Schema>) -> Result<Self> {
        let mut registry = Self::new(settings);
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, schema: Schema) -> Result<()> {
        let name = normalize_schema_name(&schema.name)?;
        if self.factories.contains_key(&name) {
            return Err(Error::Registration(format!(
                "schema {name:?} is already registered"
            )));
        }
        debug!(schema = %name, dialect = ?schema.factory.dialect(), "Registered sink schema");
        self.factories.insert(name, schema.factory);
        Ok(())
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.factories.contains_key(&schema.to_ascii_lowercase())
    }

    /// Registered schema names, sorted.
    pub fn schemas(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open a sink for `raw_url` through the factory of its scheme.
    pub async fn open(&self, raw_url: &str) -> Result<Sink> {
        let url = Url::parse(raw_url)?;
        let factory = self.factories.get(url.scheme()).ok_or_else(|| {
            Error::Configuration(format!(
                "no sink registered for schema {:?}",
                url.scheme()
            ))
        })?;

        let sink = factory.build(&url, &self.settings).await?;
        info!(schema = url.scheme(), topic = %sink.config().topic, "Opened log sink");
        Ok(sink)
    }
}

/// Initialize the process-wide registry with `schemas`. Can only succeed once.
pub fn init_global(
    settings: Settings,
    schemas: impl IntoIterator<Item = Schema>,
) -> Result<&'static SinkRegistry> {
    let registry = SinkRegistry::init(settings, schemas)?;
    GLOBAL_REGISTRY.set(registry).map_err(|_| {
        Error::Registration("the global sink registry is already initialized".to_string())
    })?;
    global()
}

/// The process-wide registry.
pub fn global() -> Result<&'static SinkRegistry> {
    GLOBAL_REGISTRY.get().ok_or_else(|| {
        Error::Configuration("the global sink registry is not initialized".to_string())
    })
}

/// Open a sink through the process-wide registry.
pub async fn open(raw_url: &str) -> Result<Sink> {
    global()?.open(raw_url).await
}
