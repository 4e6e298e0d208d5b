//! Log sinks publishing encoded log records to pub/sub topics.
//!
//! A sink is opened from a URL such as `mem://app/logs` or
//! `pubsub://projects/my-project/topics/logs?srvAddr=localhost:8085`. The scheme of the URL
//! selects a registered [Schema], which resolves the rest of the URL in its [Dialect] and opens
//! the transport resources. Writes are fire-and-forget: every record is published in the
//! background under its own deadline and delivery failures are only logged.
//!
//! [SinkWriter] plugs a sink into `tracing-subscriber`.

pub use crate::config::Settings;
pub use crate::duration::SignedDuration;
pub use crate::error::{Error, Result};
pub use crate::registry::{
    MEM_SCHEMA, PUBSUB_SCHEMA, Schema, ServiceSinkFactory, SinkFactory, SinkRegistry,
    TopicSinkFactory, default_schemas, global, init_global, open,
};
pub use crate::resolver::{Dialect, SinkConfig, resolve};
pub use crate::sink::{DELIVERY_TARGET, LogSink, ServiceSink, Sink, TopicSink};
pub use crate::writer::SinkWriter;

/// Settings shared by every sink, loaded from the environment.
pub mod config;

/// Signed, Go-style duration strings.
pub mod duration;

mod error;

/// Schemas, factories and the process-wide registry.
pub mod registry;

/// Sink URL resolution.
pub mod resolver;

/// The sink capability and its implementations.
pub mod sink;

/// `tracing-subscriber` integration.
pub mod writer;
