use crate::config::Config;
use crate::events::AppEvent;
use async_channel::Sender;
use tokio::signal::unix::{SignalKind, signal};

/// Spawns the socket server, the config watcher and the signal handler onto the
/// current tokio runtime.
pub fn start_background_services(config: &Config, tx: Sender<AppEvent>) {
    {
        let tx = tx.clone();
        let socket_path = config.socket_path.clone();
        tokio::spawn(async move {
            crate::sys::server::run_server(socket_path, tx).await;
        });
    }

    {
        let tx = tx.clone();
        tokio::spawn(async move {
            crate::config::run_async_watcher(tx).await;
        });
    }

    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                log::info!("Received shutdown signal");
                let _ = tx.send(AppEvent::Shutdown).await;
            }
            Err(e) => log::error!("Failed to listen for shutdown signals: {}", e),
        }
    });
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}
