//! The subordinate process (C3): owns the SSH connection pool and the task table, and serves
//! the front's RPC calls over its own stdin/stdout/stderr (spec §4.3, §10).

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{stdin, stdout};

use hostsniff_core::config::SUPERVISOR_IDLE_POLL_INTERVAL;
use hostsniff_core::ipc::{self, Command, CommandResult};
use hostsniff_core::pool::ConnectionPool;
use hostsniff_core::supervisor::{init_logging, TaskSupervisor};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    init_logging();

    let pool = Arc::new(ConnectionPool::new());
    let mut supervisor = TaskSupervisor::new(pool);

    let mut commands = ipc::framed_reader(stdin());
    let mut results = ipc::framed_writer(stdout());

    loop {
        let frame = match tokio::time::timeout(SUPERVISOR_IDLE_POLL_INTERVAL, commands.next()).await
        {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                tracing::error!("command queue read error: {err}");
                break;
            }
            // The front closed its end (process exited without an orderly Shutdown); stop.
            Ok(None) => break,
            // Idle tick: no command arrived within the poll window, loop back around.
            Err(_) => continue,
        };

        let command: Command = match serde_json::from_slice(&frame) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!("discarding malformed command frame: {err}");
                continue;
            }
        };

        let is_shutdown = matches!(command, Command::Shutdown);
        let result: CommandResult = supervisor.dispatch(command).await;

        if let Ok(payload) = serde_json::to_vec(&result) {
            if results.send(Bytes::from(payload)).await.is_err() {
                break;
            }
        }

        if is_shutdown {
            break;
        }
    }

    supervisor.shutdown().await;
}
