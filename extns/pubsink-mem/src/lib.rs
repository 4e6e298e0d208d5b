//! In-process pub/sub transport.
//!
//! [Broker] backs the `mem` schema: topics live in the process and every [Subscription] created
//! before a publish receives a copy of the message. [Emulator] mimics a managed pub/sub service
//! (project scoped clients, a dialable address) so the managed-service sinks can be exercised
//! without any network. Both share a [FaultInjector] to force latency and failures.

/// Named in-memory topics and their subscriptions.
pub mod broker;

/// Managed-service emulator.
pub mod emulator;

/// Error and latency injection.
mod fault;

pub use broker::{Broker, MemTopic, Subscription};
pub use emulator::Emulator;
pub use fault::FaultInjector;
pub use pubsink_shared::{Error, Result};
