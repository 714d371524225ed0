use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tracing::{error, info};

/// Process-level event that ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    /// The input stream closed.
    EndOfInput,
}

/// Waits for SIGINT or SIGTERM. This is the host's termination hook.
pub async fn wait_for_termination_signal() -> TerminationSignal {
    #[cfg(unix)]
    {
        let mut sigterm = match unix_signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                return wait_for_ctrl_c().await;
            }
        };

        tokio::select! {
            signal = wait_for_ctrl_c() => signal,
            _ = sigterm.recv() => {
                info!("Received SIGTERM, terminating session");
                TerminationSignal::Terminate
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> TerminationSignal {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT (Ctrl+C), terminating session"),
        Err(err) => {
            error!("Failed to listen for SIGINT: {}", err);
            // Without a signal source the session ends only with its input.
            std::future::pending::<()>().await;
        }
    }
    TerminationSignal::Interrupt
}
