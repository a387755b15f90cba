//! Signal handling for graceful shutdown.

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shutdown signals, registered up front so a registration failure surfaces
/// to the caller instead of being mistaken for a signal.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the SIGTERM handler. Ctrl+C is listened for as well.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Completes when Ctrl+C or SIGTERM is received.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal (Ctrl+C), exiting gracefully..."),
            Err(e) => {
                log::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            },
        }
    }

    /// Cancel `token` once a shutdown signal arrives.
    pub fn cancel_on_signal(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.recv().await;
            token.cancel();
        })
    }
}
