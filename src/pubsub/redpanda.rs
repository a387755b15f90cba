//! Redpanda (Kafka-compatible) queue backend.
//!
//! Each staking queue maps to a topic of the same name. Every opened queue
//! owns its own producer so queues never share connection state.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;

use super::client::{QueueClient, QueueConnector, QueueError};
use crate::config::QueueSettings;

/// Opens [`RedpandaQueue`]s against the configured brokers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedpandaConnector;

#[async_trait]
impl QueueConnector for RedpandaConnector {
    type Client = RedpandaQueue;

    async fn connect(
        &self,
        settings: &QueueSettings,
        queue_name: &str,
    ) -> Result<RedpandaQueue, QueueError> {
        info!("Connecting to Redpanda brokers {} for queue {}", settings.url, queue_name);

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &settings.url)
            .set("message.timeout.ms", "0") // No producer-side deadline, callers cancel
            .set("linger.ms", "0");

        if !settings.user.is_empty() {
            config
                .set("security.protocol", "SASL_PLAINTEXT")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", &settings.user)
                .set("sasl.password", &settings.password);
        }

        let producer: FutureProducer = config.create()?;

        // Metadata requests block, keep them off the async workers
        let probe = producer.clone();
        let topic = queue_name.to_string();
        let timeout = Duration::from_millis(settings.connect_timeout_ms);
        let exists = tokio::task::spawn_blocking(move || {
            let metadata = probe.client().fetch_metadata(Some(topic.as_str()), timeout)?;
            Ok::<_, KafkaError>(
                metadata
                    .topics()
                    .iter()
                    .any(|t| t.name() == topic && t.error().is_none()),
            )
        })
        .await
        .map_err(|e| QueueError::Unavailable(e.to_string()))??;

        if !exists {
            return Err(QueueError::NotFound(queue_name.to_string()));
        }

        info!("Redpanda queue {} ready", queue_name);

        Ok(RedpandaQueue {
            producer,
            topic: queue_name.to_string(),
            flush_timeout: Duration::from_millis(settings.flush_timeout_ms),
        })
    }
}

/// A producer bound to a single topic.
pub struct RedpandaQueue {
    producer: FutureProducer,
    topic: String,
    flush_timeout: Duration,
}

#[async_trait]
impl QueueClient for RedpandaQueue {
    fn queue_name(&self) -> &str {
        &self.topic
    }

    async fn send_message(&self, cancel: &CancellationToken, body: &str) -> Result<(), QueueError> {
        let record = FutureRecord::<(), str>::to(&self.topic).payload(body);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
            result = self.producer.send(record, Timeout::Never) => match result {
                Ok(_) => Ok(()),
                Err((e, _)) => Err(e.into()),
            },
        }
    }

    async fn stop(self) -> Result<(), QueueError> {
        let topic = self.topic;
        let producer = self.producer;
        let flush_timeout = self.flush_timeout;

        tokio::task::spawn_blocking(move || producer.flush(flush_timeout))
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?
            .map_err(|e| {
                warn!("Failed to flush Redpanda queue {}: {}", topic, e);
                e.into()
            })
    }
}
