//! Queue capability consumed by the publisher.
//!
//! A [`QueueConnector`] opens a named queue; the resulting [`QueueClient`]
//! sends string payloads and is stopped exactly once.

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::QueueSettings;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Kafka(#[from] KafkaError),
    #[error("queue {0} not found")]
    NotFound(String),
    /// The caller stopped waiting for the broker ack. Delivery is unconfirmed,
    /// not ruled out: a backend may already hold the message and still deliver
    /// it, e.g. when the queue is flushed on stop.
    #[error("send cancelled before delivery was confirmed")]
    Cancelled,
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Opens connections to named queues.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    type Client: QueueClient;

    async fn connect(
        &self,
        settings: &QueueSettings,
        queue_name: &str,
    ) -> Result<Self::Client, QueueError>;
}

/// A live connection to one queue.
#[async_trait]
pub trait QueueClient: Send + Sync + Sized {
    fn queue_name(&self) -> &str;

    /// Send one message and wait for the broker ack. Resolves to
    /// [`QueueError::Cancelled`] once `cancel` fires.
    async fn send_message(&self, cancel: &CancellationToken, body: &str) -> Result<(), QueueError>;

    async fn stop(self) -> Result<(), QueueError>;
}
