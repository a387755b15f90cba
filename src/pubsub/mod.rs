//! Pub/Sub messaging module for staking event streaming.
//!
//! Provides the queue capability, a Redpanda (Kafka-compatible) backend,
//! an in-memory backend, and the publisher that routes each staking event
//! kind to its own queue.

mod client;
pub mod memory;
mod publisher;
mod redpanda;

pub use client::{QueueClient, QueueConnector, QueueError};
pub use memory::{MemoryConnector, MemoryQueue};
pub use publisher::{EventPublisher, PublisherError};
pub use redpanda::{RedpandaConnector, RedpandaQueue};
