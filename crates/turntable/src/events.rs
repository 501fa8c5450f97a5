use spinframe::protocol::{Command, Reply};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum AppEvent {
    Request {
        command: Command,
        reply: oneshot::Sender<Reply>,
    },
    ConfigReload,
    Shutdown,
}
