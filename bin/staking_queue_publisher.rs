use anyhow::Context;
use jemallocator::Jemalloc;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use staking_queue::{
    pubsub::{QueueClient, QueueError},
    shutdown::ShutdownSignal,
    EventPublisher, PublisherError, RedpandaConnector, Settings, StakingEvent,
};

/// Replays newline-delimited staking events from stdin onto the staking queues.
#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .context("Failed to install logger")?;

    let settings = Settings::new()
        .context("Failed to load config. Please ensure it exists and is valid")?;

    let publisher = EventPublisher::new(&RedpandaConnector, &settings.queue)
        .await
        .context("Failed to open staking queues")?;

    let shutdown = ShutdownSignal::install().context("Failed to install SIGTERM handler")?;
    let cancellation_token = CancellationToken::new();
    shutdown.cancel_on_signal(cancellation_token.clone());

    let result = publish_stdin(&publisher, &cancellation_token).await;

    info!("Stopping staking queues...");
    publisher
        .stop()
        .await
        .context("Failed to stop staking queues")?;

    result
}

async fn publish_stdin<Q: QueueClient>(
    publisher: &EventPublisher<Q>,
    cancellation_token: &CancellationToken,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;
    let mut published = 0usize;

    loop {
        let line = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read event from stdin")?,
        };

        let Some(line) = line else {
            info!("End of input reached");
            break;
        };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        let event = StakingEvent::from_json(&line)
            .with_context(|| format!("Malformed event on line {}", line_number))?;

        match publisher.push_event(&event, cancellation_token).await {
            Ok(()) => published += 1,
            Err(PublisherError::Push {
                source: QueueError::Cancelled,
                ..
            }) => {
                warn!(
                    "Delivery of {} event {} not confirmed before shutdown, it may still be flushed",
                    event.event_type(),
                    event.staking_tx_hash_hex()
                );
                break;
            },
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to publish event on line {}", line_number))
            },
        }
    }

    info!("Published {} staking events", published);
    Ok(())
}
