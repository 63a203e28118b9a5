//! A `Transport` is an authenticated SSH session reusable for multiple concurrent channels.
//!
//! `russh::client::Handle` is `!Sync` with respect to interior state, so — exactly as the
//! surrounding codebase does for interactive sessions — exclusive access to it is owned by a
//! single task ("the handle owner"); every other task reaches it only through a command
//! channel. A `Transport` is that command channel plus the values needed to identify it.

use russh::client::Msg;
use russh::Channel;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum TransportCommand {
    OpenExecChannel {
        command: String,
        reply: oneshot::Sender<Result<Channel<Msg>, russh::Error>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// A cheap, cloneable reference to one authenticated SSH session.
///
/// Cloning a `Transport` does not open a new connection; every clone shares the same
/// underlying handle-owner task.
#[derive(Clone)]
pub struct Transport {
    cmd_tx: mpsc::Sender<TransportCommand>,
}

impl Transport {
    /// Take ownership of a connected, authenticated `russh` handle and spawn the task that
    /// will exclusively own it for the rest of its life.
    pub fn spawn(handle: russh::client::Handle<super::client::SniffClientHandler>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        tokio::spawn(transport_owner_loop(handle, cmd_rx));
        Self { cmd_tx }
    }

    /// Open a session channel and issue `exec` for `command` on it. Returns the open channel;
    /// the caller is thereafter the sole reader, exactly as with an interactive session channel.
    pub async fn exec(&self, command: &str) -> Result<Channel<Msg>, russh::Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(TransportCommand::OpenExecChannel {
                command: command.to_string(),
                reply,
            })
            .await
            .map_err(|_| russh::Error::Disconnect)?;
        reply_rx.await.map_err(|_| russh::Error::Disconnect)?
    }

    /// Tear down the underlying SSH session. Idempotent: a transport whose owner task has
    /// already exited simply drops this request.
    pub async fn disconnect(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(TransportCommand::Disconnect { reply })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

async fn transport_owner_loop(
    mut handle: russh::client::Handle<super::client::SniffClientHandler>,
    mut cmd_rx: mpsc::Receiver<TransportCommand>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            TransportCommand::OpenExecChannel { command, reply } => {
                let result = open_exec_channel(&mut handle, &command).await;
                if reply.send(result).is_err() {
                    debug!("caller dropped before receiving exec channel result");
                }
            }
            TransportCommand::Disconnect { reply } => {
                let _ = handle
                    .disconnect(russh::Disconnect::ByApplication, "", "")
                    .await;
                let _ = reply.send(());
                break;
            }
        }
    }
}

async fn open_exec_channel(
    handle: &mut russh::client::Handle<super::client::SniffClientHandler>,
    command: &str,
) -> Result<Channel<Msg>, russh::Error> {
    let channel = handle.channel_open_session().await?;
    if let Err(e) = channel.exec(true, command).await {
        warn!("exec failed for command {:?}: {}", command, e);
        return Err(e);
    }
    Ok(channel)
}
