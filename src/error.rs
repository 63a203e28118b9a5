//! Closed error taxonomies for each boundary the core exposes.
//!
//! Every variant carries only data that is safe to serialize across the supervisor/front
//! wire protocol: messages and codes, never live transports, channels or file handles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures from the SSH connection pool (C1).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PoolError {
    #[error("failed to connect to {address}:{port}: {reason}")]
    ConnectFailed {
        address: String,
        port: u16,
        reason: String,
    },
    #[error("unknown lease id \"{lease_id}\"")]
    UnknownLease { lease_id: String },
}

/// The reason a capture worker terminated (C2).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum DumperError {
    #[error("remote command exited with status {0} before the first poll")]
    EarlyTermination(u32),
    #[error("failed to open output file: {0}")]
    FileOpenFailed(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("failed to acquire SSH lease: {0}")]
    ConnectFailed(String),
}

impl From<PoolError> for DumperError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ConnectFailed { .. } => DumperError::ConnectFailed(err.to_string()),
            PoolError::UnknownLease { .. } => DumperError::ConnectFailed(err.to_string()),
        }
    }
}

/// Failures surfaced by the supervisor's command dispatch (C3).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SupervisorError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("Task with id=\"{task_id}\" not found in task list.")]
    UnknownTask { task_id: String },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Dumper(#[from] DumperError),
}

/// Failures on the front (caller-side, C4).
#[derive(Debug, Error)]
pub enum FrontError {
    #[error("TaskManager not started")]
    NotStarted,
    #[error("no answer was received within {0:?}")]
    RpcTimeout(std::time::Duration),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("failed to communicate with supervisor process: {0}")]
    Transport(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_message_matches_original_wording() {
        let err = SupervisorError::UnknownTask {
            task_id: "yhsf76ha".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Task with id=\"yhsf76ha\" not found in task list."
        );
    }

    #[test]
    fn supervisor_errors_round_trip_as_json() {
        let err = SupervisorError::Pool(PoolError::UnknownLease {
            lease_id: "AB12CD34".to_string(),
        });
        let encoded = serde_json::to_string(&err).unwrap();
        let decoded: SupervisorError = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.to_string(), err.to_string());
    }
}
