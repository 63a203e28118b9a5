//! Supervisor Front (C4): spawns the subordinate process, issues RPCs over the framed
//! command/result queues, and forwards worker log records (read off the log queue) into the
//! caller's own `tracing` subscriber.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

use crate::config::FrontConfig;
use crate::error::FrontError;
use crate::ipc::{self, Command, CommandResponse, CommandResult, LogRecord};
use crate::model::{Host, Task};

/// Overrides the path to the supervisor binary; set in tests so the front doesn't depend on
/// a sibling binary existing next to the test harness's own executable.
pub const SUPERVISOR_BIN_ENV: &str = "HOSTSNIFF_SUPERVISOR_BIN";
const SUPERVISOR_BIN_NAME: &str = "hostsniff-supervisor";

struct RpcChannel {
    writer: FramedWrite<ChildStdin, LengthDelimitedCodec>,
    reader: FramedRead<ChildStdout, LengthDelimitedCodec>,
}

struct Running {
    child: Child,
    rpc: Mutex<RpcChannel>,
    log_forwarder: JoinHandle<()>,
}

/// The caller-side half of the supervisor pair. Not started until `start()` is called;
/// every RPC method before that fails with `FrontError::NotStarted`.
pub struct TaskFront {
    config: FrontConfig,
    running: Option<Running>,
}

impl TaskFront {
    pub fn new(config: FrontConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// Spawn the subordinate process with a clean (non-forked) spawn so no foreground file
    /// descriptors leak into it, then start the log-forwarding task that drains its stderr.
    pub async fn start(&mut self) -> Result<(), FrontError> {
        let bin = supervisor_binary_path();
        let mut child = ProcessCommand::new(&bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let log_forwarder = tokio::spawn(forward_logs(stderr));

        self.running = Some(Running {
            child,
            rpc: Mutex::new(RpcChannel {
                writer: ipc::framed_writer(stdin),
                reader: ipc::framed_reader(stdout),
            }),
            log_forwarder,
        });
        info!(bin = %bin.display(), "supervisor process started");
        Ok(())
    }

    /// Enqueue `command` and wait up to the configured timeout for its result. The RPC lock
    /// ensures only one command is ever in flight, matching the no-correlation-id requirement
    /// of spec §5.
    async fn send(&self, command: Command) -> Result<CommandResponse, FrontError> {
        let running = self.running.as_ref().ok_or(FrontError::NotStarted)?;
        let mut rpc = running.rpc.lock().await;

        let payload = serde_json::to_vec(&command).map_err(to_transport_err)?;
        rpc.writer
            .send(Bytes::from(payload))
            .await
            .map_err(FrontError::Transport)?;

        let frame = tokio::time::timeout(self.config.rpc_timeout(), rpc.reader.next())
            .await
            .map_err(|_| FrontError::RpcTimeout(self.config.rpc_timeout()))?
            .ok_or_else(|| {
                to_transport_err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "supervisor closed the result stream",
                ))
            })?
            .map_err(FrontError::Transport)?;

        let result: CommandResult = serde_json::from_slice(&frame).map_err(to_transport_err)?;
        Ok(result?)
    }

    /// `dumped_interface` of `None` takes this front's configured default rather than
    /// leaving the choice to the supervisor, so a deployment can change its default capture
    /// interface without touching every call site.
    pub async fn start_pcap_dump(
        &self,
        host: Host,
        output_file: impl Into<String>,
        dumped_interface: Option<String>,
    ) -> Result<Task, FrontError> {
        let dumped_interface =
            Some(dumped_interface.unwrap_or_else(|| self.config.default_capture_interface.clone()));
        let response = self
            .send(Command::StartPcapDump {
                host,
                output_file: output_file.into(),
                dumped_interface,
            })
            .await?;
        expect_task(response)
    }

    pub async fn start_log_dump(
        &self,
        host: Host,
        output_file: impl Into<String>,
        dumped_file: impl Into<String>,
    ) -> Result<Task, FrontError> {
        let response = self
            .send(Command::StartLogDump {
                host,
                output_file: output_file.into(),
                dumped_file: dumped_file.into(),
            })
            .await?;
        expect_task(response)
    }

    pub async fn get_task_info(&self, task_id: impl Into<String>) -> Result<Task, FrontError> {
        let response = self
            .send(Command::GetTaskInfo {
                task_id: task_id.into(),
            })
            .await?;
        expect_task(response)
    }

    pub async fn get_all_tasks(&self) -> Result<Vec<Task>, FrontError> {
        match self.send(Command::GetAllTasks).await? {
            CommandResponse::Tasks(tasks) => Ok(tasks),
            other => Err(unexpected_response(other)),
        }
    }

    pub async fn stop_task(&self, task_id: impl Into<String>) -> Result<Task, FrontError> {
        let response = self
            .send(Command::StopTask {
                task_id: task_id.into(),
            })
            .await?;
        expect_task(response)
    }

    /// Signal the subordinate to stop, join it, then stop and join the log-forwarder.
    /// Idempotent: calling this on a front that was never started, or already stopped, is a
    /// no-op.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        {
            let mut rpc = running.rpc.lock().await;
            if let Ok(payload) = serde_json::to_vec(&Command::Shutdown) {
                let _ = rpc.writer.send(Bytes::from(payload)).await;
            }
        }

        if let Err(err) = running.child.wait().await {
            warn!("error waiting for supervisor process to exit: {err}");
        }

        running.log_forwarder.abort();
        let _ = running.log_forwarder.await;
        info!("supervisor process stopped");
    }
}

fn expect_task(response: CommandResponse) -> Result<Task, FrontError> {
    match response {
        CommandResponse::Task(task) | CommandResponse::Stopped(task) => Ok(task),
        other => Err(unexpected_response(other)),
    }
}

fn unexpected_response(response: CommandResponse) -> FrontError {
    to_transport_err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unexpected supervisor response: {response:?}"),
    ))
}

fn to_transport_err(err: impl std::fmt::Display) -> FrontError {
    FrontError::Transport(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

/// Locate the supervisor binary next to the current executable, overridable for tests via
/// `HOSTSNIFF_SUPERVISOR_BIN` (spec §10).
fn supervisor_binary_path() -> PathBuf {
    if let Ok(path) = std::env::var(SUPERVISOR_BIN_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join(SUPERVISOR_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(SUPERVISOR_BIN_NAME))
}

/// Drain length-framed `LogRecord`s off the supervisor's stderr and re-emit each one through
/// this process's own `tracing` subscriber, so logs from both processes interleave coherently.
async fn forward_logs(stderr: ChildStderr) {
    let mut reader = ipc::framed_reader(stderr);
    loop {
        match reader.next().await {
            Some(Ok(frame)) => match serde_json::from_slice::<LogRecord>(&frame) {
                Ok(record) => reemit(&record),
                Err(err) => debug!("discarding malformed log frame from supervisor: {err}"),
            },
            Some(Err(err)) => {
                debug!("log queue read error: {err}");
                break;
            }
            None => break,
        }
    }
}

fn reemit(record: &LogRecord) {
    let message = format!("[{}] {}", record.target, record.message);
    match record.level.as_str() {
        "ERROR" => error!(target: "supervisor", "{message}"),
        "WARN" => warn!(target: "supervisor", "{message}"),
        "DEBUG" => debug!(target: "supervisor", "{message}"),
        "TRACE" => tracing::trace!(target: "supervisor", "{message}"),
        _ => info!(target: "supervisor", "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisor_binary_path_honors_env_override() {
        std::env::set_var(SUPERVISOR_BIN_ENV, "/tmp/fake-supervisor");
        assert_eq!(
            supervisor_binary_path(),
            PathBuf::from("/tmp/fake-supervisor")
        );
        std::env::remove_var(SUPERVISOR_BIN_ENV);
    }

    #[test]
    fn unstarted_front_reports_not_started() {
        // `send` cannot be awaited outside a runtime in a plain #[test], but `running` being
        // `None` is the only path `NotStarted` can come from, so check that directly.
        let front = TaskFront::new(FrontConfig::default());
        assert!(front.running.is_none());
    }
}
