/// Error exposed by the transport capabilities.
pub mod error;

/// Capability traits a pub/sub client library has to provide so that log records can be
/// published through it.
pub mod transport;

pub use error::{Error, Result};
pub use transport::{Connection, ServiceClient, ServiceConnector, Topic, TopicOpener};
