//! The wire protocol shared by the front (C4) and the supervisor binary (C3).
//!
//! The three logical queues of spec §4.3 are realized as the subordinate process's three
//! standard streams: commands flow over its stdin, results over its stdout, log records over
//! its stderr. Every stream carries exactly one queue, so ordinary OS pipe ordering gives the
//! strict per-queue ordering §5 requires without a fourth side channel or correlation ids.
//!
//! Commands and results are framed with a length-prefixed codec so arbitrarily large JSON
//! payloads can be read back out of a byte stream reliably; log records use the same framing,
//! written directly by the supervisor's tracing layer (see `supervisor::log_forward`) rather
//! than through `tracing-subscriber`'s own stderr writer.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::SupervisorError;
use crate::model::{Host, Task};

/// One request crossing the command queue (front → supervisor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    StartPcapDump {
        host: Host,
        output_file: String,
        #[serde(default)]
        dumped_interface: Option<String>,
    },
    StartLogDump {
        host: Host,
        output_file: String,
        dumped_file: String,
    },
    GetTaskInfo {
        task_id: String,
    },
    GetAllTasks,
    StopTask {
        task_id: String,
    },
    /// Not one of the spec's RPC handlers: sent by `Front::stop()` over the same command
    /// channel to signal the dispatch loop to drain the task table and exit, since there is
    /// no side band distinct from the three named queues (spec §4.3).
    Shutdown,
}

/// The payload half of a successful result; the error half is `SupervisorError` directly.
///
/// Adjacently tagged (`kind` + `data`) rather than internally tagged: `Tasks` wraps a `Vec`,
/// which can't be merged into a single JSON object the way a struct variant can.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandResponse {
    Task(Task),
    Tasks(Vec<Task>),
    Stopped(Task),
    ShuttingDown,
}

pub type CommandResult = Result<CommandResponse, SupervisorError>;

/// One log record crossing the log queue (supervisor → front), written by the supervisor's
/// forwarding tracing layer and re-emitted by the front's log-forwarding task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Build the length-delimited framing both ends agree on: a 4-byte big-endian length prefix,
/// no further header bits, matching `tokio_util`'s defaults.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::new()
}

pub fn framed_writer<W: AsyncWrite>(inner: W) -> FramedWrite<W, LengthDelimitedCodec> {
    FramedWrite::new(inner, codec())
}

pub fn framed_reader<R: AsyncRead>(inner: R) -> FramedRead<R, LengthDelimitedCodec> {
    FramedRead::new(inner, codec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_shape_matches_spec_names() {
        let cmd = Command::GetTaskInfo {
            task_id: "AB12CD34".to_string(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["name"], "get_task_info");
        assert_eq!(json["task_id"], "AB12CD34");
    }

    #[test]
    fn shutdown_command_round_trips() {
        let encoded = serde_json::to_string(&Command::Shutdown).unwrap();
        let decoded: Command = serde_json::from_str(&encoded).unwrap();
        assert!(matches!(decoded, Command::Shutdown));
    }

    #[test]
    fn command_result_round_trips_through_json() {
        let result: CommandResult = Ok(CommandResponse::Tasks(vec![]));
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: CommandResult = serde_json::from_str(&encoded).unwrap();
        assert!(matches!(decoded, Ok(CommandResponse::Tasks(ref v)) if v.is_empty()));
    }
}
