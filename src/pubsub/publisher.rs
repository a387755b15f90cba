//! Staking event publisher.
//!
//! Owns one queue per event kind and pushes each event as a JSON document
//! to the matching queue. Every push is a single synchronous publish attempt:
//! no buffering and no retries, errors go straight back to the caller.

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::client::{QueueClient, QueueConnector, QueueError};
use crate::config::QueueSettings;
use crate::events::{
    ActiveStakingEvent, EventType, StakingEvent, UnbondingStakingEvent, WithdrawStakingEvent,
};

const LOG_TARGET: &str = "queue_publisher";

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("failed to create {kind} queue")]
    Connect {
        kind: EventType,
        #[source]
        source: QueueError,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("{kind} queue cannot carry event_type {found}")]
    WrongEventType { kind: EventType, found: u8 },
    #[error("failed to push {kind} event")]
    Push {
        kind: EventType,
        #[source]
        source: QueueError,
    },
    #[error("failed to stop {kind} queue")]
    Stop {
        kind: EventType,
        #[source]
        source: QueueError,
    },
}

/// Publishes staking events to the active staking, unbonding and withdraw
/// queues.
///
/// Push methods take `&self`, so a publisher can be shared behind an `Arc`.
/// Pushes to different queues never wait on each other.
pub struct EventPublisher<Q: QueueClient> {
    staking_queue: Q,
    unbonding_queue: Q,
    withdraw_queue: Q,
}

impl<Q: QueueClient> EventPublisher<Q> {
    /// Open the staking, unbonding and withdraw queues, in that order.
    ///
    /// If any queue fails to open, the queues already opened are stopped
    /// before the error is returned.
    pub async fn new<C>(connector: &C, settings: &QueueSettings) -> Result<Self, PublisherError>
    where
        C: QueueConnector<Client = Q>,
    {
        let staking_queue = open_queue(connector, settings, EventType::ActiveStaking).await?;

        let unbonding_queue =
            match open_queue(connector, settings, EventType::UnbondingStaking).await {
                Ok(queue) => queue,
                Err(e) => {
                    stop_quietly(staking_queue).await;
                    return Err(e);
                },
            };

        let withdraw_queue = match open_queue(connector, settings, EventType::WithdrawStaking).await
        {
            Ok(queue) => queue,
            Err(e) => {
                stop_quietly(staking_queue).await;
                stop_quietly(unbonding_queue).await;
                return Err(e);
            },
        };

        info!(target: LOG_TARGET, "Staking event publisher connected to {}", settings.url);

        Ok(Self {
            staking_queue,
            unbonding_queue,
            withdraw_queue,
        })
    }

    pub async fn push_staking_event(
        &self,
        ev: &ActiveStakingEvent,
        cancel: &CancellationToken,
    ) -> Result<(), PublisherError> {
        self.push(
            &self.staking_queue,
            EventType::ActiveStaking,
            ev.event_type,
            &ev.staking_tx_hash_hex,
            ev,
            cancel,
        )
        .await
    }

    pub async fn push_unbonding_event(
        &self,
        ev: &UnbondingStakingEvent,
        cancel: &CancellationToken,
    ) -> Result<(), PublisherError> {
        self.push(
            &self.unbonding_queue,
            EventType::UnbondingStaking,
            ev.event_type,
            &ev.staking_tx_hash_hex,
            ev,
            cancel,
        )
        .await
    }

    pub async fn push_withdraw_event(
        &self,
        ev: &WithdrawStakingEvent,
        cancel: &CancellationToken,
    ) -> Result<(), PublisherError> {
        self.push(
            &self.withdraw_queue,
            EventType::WithdrawStaking,
            ev.event_type,
            &ev.staking_tx_hash_hex,
            ev,
            cancel,
        )
        .await
    }

    /// Push an event of any kind to its queue.
    pub async fn push_event(
        &self,
        event: &StakingEvent,
        cancel: &CancellationToken,
    ) -> Result<(), PublisherError> {
        match event {
            StakingEvent::Active(ev) => self.push_staking_event(ev, cancel).await,
            StakingEvent::Unbonding(ev) => self.push_unbonding_event(ev, cancel).await,
            StakingEvent::Withdraw(ev) => self.push_withdraw_event(ev, cancel).await,
        }
    }

    async fn push<E: Serialize + Sync>(
        &self,
        queue: &Q,
        kind: EventType,
        event_type: EventType,
        tx_hash: &str,
        ev: &E,
        cancel: &CancellationToken,
    ) -> Result<(), PublisherError> {
        if event_type != kind {
            return Err(PublisherError::WrongEventType {
                kind,
                found: event_type.into(),
            });
        }

        let message_body = serde_json::to_string(ev)?;

        info!(target: LOG_TARGET, "pushing {} event: tx_hash={}", kind, tx_hash);
        queue
            .send_message(cancel, &message_body)
            .await
            .map_err(|source| PublisherError::Push { kind, source })?;
        info!(target: LOG_TARGET, "successfully pushed {} event: tx_hash={}", kind, tx_hash);

        Ok(())
    }

    /// Stop the staking, unbonding and withdraw queues, in that order.
    ///
    /// Returns on the first failure; queues after the failing one are
    /// dropped without being stopped.
    pub async fn stop(self) -> Result<(), PublisherError> {
        let queues = [
            (EventType::ActiveStaking, self.staking_queue),
            (EventType::UnbondingStaking, self.unbonding_queue),
            (EventType::WithdrawStaking, self.withdraw_queue),
        ];

        for (kind, queue) in queues {
            queue
                .stop()
                .await
                .map_err(|source| PublisherError::Stop { kind, source })?;
        }

        info!(target: LOG_TARGET, "Staking event publisher stopped");
        Ok(())
    }
}

async fn open_queue<C: QueueConnector>(
    connector: &C,
    settings: &QueueSettings,
    kind: EventType,
) -> Result<C::Client, PublisherError> {
    connector
        .connect(settings, kind.queue_name())
        .await
        .map_err(|source| PublisherError::Connect { kind, source })
}

async fn stop_quietly<Q: QueueClient>(queue: Q) {
    let name = queue.queue_name().to_string();
    if let Err(e) = queue.stop().await {
        warn!(target: LOG_TARGET, "Failed to stop queue {} after startup failure: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::events::{
        ACTIVE_STAKING_QUEUE_NAME, UNBONDING_STAKING_QUEUE_NAME, WITHDRAW_STAKING_QUEUE_NAME,
    };
    use crate::pubsub::memory::{MemoryConnector, MemoryQueue, QueueOp};

    fn settings() -> QueueSettings {
        QueueSettings::new("memory", "user", "password")
    }

    async fn publisher(connector: &MemoryConnector) -> EventPublisher<MemoryQueue> {
        EventPublisher::new(connector, &settings()).await.unwrap()
    }

    fn active_event() -> ActiveStakingEvent {
        ActiveStakingEvent::new(
            "ffee01",
            "02abcdef",
            "03fedcba",
            100_000,
            812_345,
            1_717_000_000,
            64_000,
            0,
            "a1b2c3",
            false,
        )
    }

    #[tokio::test]
    async fn test_push_staking_event_sends_once() {
        let connector = MemoryConnector::new();
        let publisher = publisher(&connector).await;
        let ev = active_event();

        publisher
            .push_staking_event(&ev, &CancellationToken::new())
            .await
            .unwrap();

        let sent = connector.sent(ACTIVE_STAKING_QUEUE_NAME);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("\"staking_tx_hex\":\"a1b2c3\""));
        assert!(sent[0].contains("\"staking_value\":100000"));

        let decoded: ActiveStakingEvent = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(decoded, ev);

        assert!(connector.sent(UNBONDING_STAKING_QUEUE_NAME).is_empty());
        assert!(connector.sent(WITHDRAW_STAKING_QUEUE_NAME).is_empty());
    }

    #[tokio::test]
    async fn test_push_event_routes_by_kind() {
        let connector = MemoryConnector::new();
        let publisher = publisher(&connector).await;
        let cancel = CancellationToken::new();

        let unbonding = UnbondingStakingEvent::new("ffee01", 900, 1_718_000_000, 1_008, 0, "beef", "cafe");
        let withdraw = WithdrawStakingEvent::new("ffee01");

        publisher
            .push_event(&StakingEvent::Unbonding(unbonding.clone()), &cancel)
            .await
            .unwrap();
        publisher
            .push_event(&StakingEvent::Withdraw(withdraw.clone()), &cancel)
            .await
            .unwrap();

        let sent = connector.sent(UNBONDING_STAKING_QUEUE_NAME);
        assert_eq!(sent.len(), 1);
        assert_eq!(serde_json::from_str::<UnbondingStakingEvent>(&sent[0]).unwrap(), unbonding);

        let sent = connector.sent(WITHDRAW_STAKING_QUEUE_NAME);
        assert_eq!(sent.len(), 1);
        assert_eq!(serde_json::from_str::<WithdrawStakingEvent>(&sent[0]).unwrap(), withdraw);

        assert!(connector.sent(ACTIVE_STAKING_QUEUE_NAME).is_empty());
    }

    #[tokio::test]
    async fn test_decoded_event_is_pushed_canonical() {
        let connector = MemoryConnector::new();
        let publisher = publisher(&connector).await;

        let line = r#"{"event_type":1,"staking_tx_hash_hex":"0xFFEE01","staker_pk_hex":"02abcdef","finality_provider_pk_hex":"03fedcba","staking_value":100000,"staking_start_height":812345,"staking_start_timestamp":1717000000,"staking_timelock":64000,"staking_output_index":0,"staking_tx_hex":"0xA1B2C3","is_overflow":false}"#;
        let event = StakingEvent::from_json(line).unwrap();

        publisher
            .push_event(&event, &CancellationToken::new())
            .await
            .unwrap();

        let sent = connector.sent(ACTIVE_STAKING_QUEUE_NAME);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("\"staking_tx_hash_hex\":\"ffee01\""));
        assert!(sent[0].contains("\"staking_tx_hex\":\"a1b2c3\""));
        assert!(!sent[0].contains("0x"));
    }

    #[tokio::test]
    async fn test_push_rejects_foreign_event_type() {
        let connector = MemoryConnector::new();
        let publisher = publisher(&connector).await;

        let mut ev = active_event();
        ev.event_type = EventType::WithdrawStaking;

        let err = publisher
            .push_staking_event(&ev, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PublisherError::WrongEventType {
                kind: EventType::ActiveStaking,
                found: 3,
            }
        ));
        assert!(connector.sent(ACTIVE_STAKING_QUEUE_NAME).is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_wraps_cause() {
        let connector = MemoryConnector::new();
        connector.fail_send(UNBONDING_STAKING_QUEUE_NAME);
        let publisher = publisher(&connector).await;

        let ev = UnbondingStakingEvent::new("ffee01", 900, 1_718_000_000, 1_008, 0, "beef", "cafe");
        let err = publisher
            .push_unbonding_event(&ev, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to push unbonding event"));
        assert!(matches!(
            err,
            PublisherError::Push {
                kind: EventType::UnbondingStaking,
                source: QueueError::Unavailable(_),
            }
        ));
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("connection refused"));

        // Single attempt, no retry
        assert_eq!(connector.sent(UNBONDING_STAKING_QUEUE_NAME).len(), 1);
    }

    #[tokio::test]
    async fn test_construction_fails_on_second_queue() {
        let connector = MemoryConnector::new();
        connector.fail_connect(UNBONDING_STAKING_QUEUE_NAME);

        let err = EventPublisher::new(&connector, &settings())
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("failed to create unbonding queue"));
        assert!(matches!(
            err,
            PublisherError::Connect {
                kind: EventType::UnbondingStaking,
                ..
            }
        ));

        // Withdraw never opened, staking closed again
        assert_eq!(
            connector.ops(),
            vec![
                QueueOp::Connect(ACTIVE_STAKING_QUEUE_NAME.to_string()),
                QueueOp::Connect(UNBONDING_STAKING_QUEUE_NAME.to_string()),
                QueueOp::Stop(ACTIVE_STAKING_QUEUE_NAME.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_construction_fails_on_third_queue_stops_both() {
        let connector = MemoryConnector::new();
        connector.fail_connect(WITHDRAW_STAKING_QUEUE_NAME);
        connector.fail_stop(ACTIVE_STAKING_QUEUE_NAME);

        let err = EventPublisher::new(&connector, &settings())
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("failed to create withdraw queue"));
        assert_eq!(
            connector.stopped(),
            vec![
                ACTIVE_STAKING_QUEUE_NAME.to_string(),
                UNBONDING_STAKING_QUEUE_NAME.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_closes_in_order() {
        let connector = MemoryConnector::new();
        let publisher = publisher(&connector).await;

        publisher.stop().await.unwrap();

        assert_eq!(
            connector.stopped(),
            vec![
                ACTIVE_STAKING_QUEUE_NAME.to_string(),
                UNBONDING_STAKING_QUEUE_NAME.to_string(),
                WITHDRAW_STAKING_QUEUE_NAME.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_returns_first_failure_without_closing_rest() {
        let connector = MemoryConnector::new();
        connector.fail_stop(ACTIVE_STAKING_QUEUE_NAME);
        let publisher = publisher(&connector).await;

        let err = publisher.stop().await.unwrap_err();

        assert!(matches!(
            err,
            PublisherError::Stop {
                kind: EventType::ActiveStaking,
                ..
            }
        ));
        assert_eq!(connector.stopped(), vec![ACTIVE_STAKING_QUEUE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_slow_staking_push_does_not_block_unbonding() {
        let connector = MemoryConnector::new();
        let gate = connector.hold_sends(ACTIVE_STAKING_QUEUE_NAME);
        let publisher = Arc::new(publisher(&connector).await);

        let staking = {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                publisher
                    .push_staking_event(&active_event(), &CancellationToken::new())
                    .await
            })
        };

        while connector.sent(ACTIVE_STAKING_QUEUE_NAME).is_empty() {
            tokio::task::yield_now().await;
        }

        let ev = UnbondingStakingEvent::new("ffee01", 900, 1_718_000_000, 1_008, 0, "beef", "cafe");
        tokio::time::timeout(
            Duration::from_secs(1),
            publisher.push_unbonding_event(&ev, &CancellationToken::new()),
        )
        .await
        .expect("unbonding push blocked by staking push")
        .unwrap();

        assert!(!staking.is_finished());

        gate.cancel();
        staking.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_push_returns_error() {
        let connector = MemoryConnector::new();
        let _gate = connector.hold_sends(WITHDRAW_STAKING_QUEUE_NAME);
        let publisher = Arc::new(publisher(&connector).await);
        let cancel = CancellationToken::new();

        let withdraw = {
            let publisher = publisher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                publisher
                    .push_withdraw_event(&WithdrawStakingEvent::new("ffee01"), &cancel)
                    .await
            })
        };

        while connector.sent(WITHDRAW_STAKING_QUEUE_NAME).is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let err = withdraw.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("failed to push withdraw event"));
        assert!(matches!(
            err,
            PublisherError::Push {
                source: QueueError::Cancelled,
                ..
            }
        ));

        // The backend already holds the body: cancellation only means unconfirmed
        assert_eq!(connector.sent(WITHDRAW_STAKING_QUEUE_NAME).len(), 1);
    }
}
