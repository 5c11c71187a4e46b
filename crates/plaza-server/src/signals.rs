//! Shutdown signal handling.

use tokio::signal;

/// Resolves when the process receives SIGINT or SIGTERM (Ctrl+C on
/// Windows).
pub async fn shutdown_signal() {
    if let Err(e) = wait_for_signal().await {
        tracing::error!(error = %e, "cannot listen for shutdown signals");
        // Without signal handling the only way out is killing the process.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}
