use crate::events::AppEvent;
use async_channel::Sender;
use spinframe::protocol::{Command, Reply};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;

pub async fn run_server(socket_path: PathBuf, tx: Sender<AppEvent>) {
    // Cleanup old socket if it exists
    if fs_err::metadata(&socket_path).is_ok() {
        let _ = fs_err::remove_file(&socket_path);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            log::error!(
                "Failed to bind unix socket {}: {}",
                socket_path.display(),
                e
            );
            return;
        }
    };
    log::info!("Listening on {}", socket_path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_client(stream, tx.clone()));
            }
            Err(e) => {
                log::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Answers every line a client sends with exactly one reply line.
async fn handle_client(stream: UnixStream, tx: Sender<AppEvent>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match line.parse::<Command>() {
            Ok(command) => dispatch(&tx, command).await,
            Err(e) => {
                log::debug!("Rejected '{}': {}", line.trim(), e);
                Reply::err(e)
            }
        };

        if let Err(e) = writer.write_all(format!("{reply}\n").as_bytes()).await {
            log::debug!("Client went away: {}", e);
            break;
        }
    }
}

/// Hands a command to the application loop and waits for its answer.
pub async fn dispatch(tx: &Sender<AppEvent>, command: Command) -> Reply {
    let (reply_tx, reply_rx) = oneshot::channel();
    let request = AppEvent::Request {
        command,
        reply: reply_tx,
    };
    if tx.send(request).await.is_err() {
        return Reply::err("turntable is shutting down");
    }
    reply_rx
        .await
        .unwrap_or_else(|_| Reply::err("turntable is shutting down"))
}
