//! Process-boundary adapter turning termination signals into cancellation.

use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first Ctrl+C or (on Unix) SIGTERM.
///
/// Must be called from within a tokio runtime.
pub fn listen(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("Shutdown signal received. Finishing current batch...");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed while waiting for shutdown signal: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("failed while waiting for shutdown signal: {}", e);
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed while waiting for shutdown signal: {}", e);
    }
}
