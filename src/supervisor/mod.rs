//! Task Supervisor (C3): owns the pool instance and the task table of a single subordinate
//! process, dispatching RPC commands one at a time in enqueue order.
//!
//! Per spec §9's redesign note, the pool is an explicit dependency constructed once at process
//! startup (see `bin/supervisor.rs`) and handed in here, not a lazily-initialized singleton.

mod log_forward;

pub use log_forward::init_logging;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

use crate::error::SupervisorError;
use crate::ids::random_unique_id;
use crate::ipc::{Command, CommandResponse, CommandResult};
use crate::model::{Host, Task, TaskType};
use crate::pool::ConnectionPool;
use crate::worker::{CaptureKind, Worker};

/// `tasks : TaskId → Worker`, insertion-ordered so `get_all_tasks` and shutdown both observe
/// the order tasks were created in (spec §3, §4.3).
pub struct TaskSupervisor {
    pool: Arc<ConnectionPool>,
    tasks: IndexMap<String, Worker>,
}

impl TaskSupervisor {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            tasks: IndexMap::new(),
        }
    }

    /// Dispatch one command to its handler, exhaustively matched rather than looked up by
    /// reflective name (spec §9 redesign note). `Shutdown` is handled by the caller's dispatch
    /// loop, not here, since it ends the loop rather than producing an ordinary result.
    pub async fn dispatch(&mut self, command: Command) -> CommandResult {
        match command {
            Command::StartPcapDump {
                host,
                output_file,
                dumped_interface,
            } => {
                self.start_capture(
                    host,
                    output_file,
                    CaptureKind::Pcap {
                        dumped_interface: dumped_interface.unwrap_or_else(|| "any".to_string()),
                    },
                )
                .await
            }
            Command::StartLogDump {
                host,
                output_file,
                dumped_file,
            } => {
                self.start_capture(host, output_file, CaptureKind::Log { dumped_file })
                    .await
            }
            Command::GetTaskInfo { task_id } => self.get_task_info(&task_id),
            Command::GetAllTasks => Ok(CommandResponse::Tasks(self.get_all_tasks())),
            Command::StopTask { task_id } => self.stop_task(&task_id).await,
            Command::Shutdown => Ok(CommandResponse::ShuttingDown),
        }
    }

    /// Stop every worker in the table, in insertion order, then empty the table. Called once
    /// by the dispatch loop after it observes `Command::Shutdown` (spec §4.3).
    pub async fn shutdown(&mut self) {
        for (task_id, mut worker) in std::mem::take(&mut self.tasks) {
            info!(task_id = %task_id, "stopping worker for supervisor shutdown");
            worker.stop().await;
        }
    }

    fn next_task_id(&self) -> String {
        let taken: HashSet<String> = self.tasks.keys().cloned().collect();
        random_unique_id(&taken)
    }

    async fn start_capture(
        &mut self,
        host: Host,
        output_file: String,
        kind: CaptureKind,
    ) -> CommandResult {
        let task_id = self.next_task_id();
        let name = format!("proc_{}.{}{}", std::process::id(), kind.name_prefix(), task_id);
        let task_type = kind.task_type();
        let worker = Worker::start(
            name.clone(),
            kind,
            self.pool.clone(),
            host,
            PathBuf::from(output_file),
        );
        let snapshot = Task {
            task_id: task_id.clone(),
            name,
            task_type,
            is_alive: worker.is_alive(),
        };
        info!(task_id = %task_id, name = %snapshot.name, "started capture");
        self.tasks.insert(task_id, worker);
        Ok(CommandResponse::Task(snapshot))
    }

    fn get_task_info(&self, task_id: &str) -> CommandResult {
        let worker = self
            .tasks
            .get(task_id)
            .ok_or_else(|| unknown_task(task_id))?;
        Ok(CommandResponse::Task(snapshot_of(task_id, worker)))
    }

    fn get_all_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .map(|(task_id, worker)| snapshot_of(task_id, worker))
            .collect()
    }

    async fn stop_task(&mut self, task_id: &str) -> CommandResult {
        let (task_id, mut worker) = self
            .tasks
            .shift_remove_entry(task_id)
            .ok_or_else(|| unknown_task(task_id))?;
        worker.stop().await;
        let snapshot = Task {
            task_id: task_id.clone(),
            name: worker.name().to_string(),
            task_type: worker.task_type(),
            is_alive: worker.is_alive(),
        };
        info!(task_id = %task_id, "stopped capture");
        Ok(CommandResponse::Stopped(snapshot))
    }
}

fn snapshot_of(task_id: &str, worker: &Worker) -> Task {
    Task {
        task_id: task_id.to_string(),
        name: worker.name().to_string(),
        task_type: worker.task_type(),
        is_alive: worker.is_alive(),
    }
}

fn unknown_task(task_id: &str) -> SupervisorError {
    SupervisorError::UnknownTask {
        task_id: task_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_task_lookups_match_spec_wording() {
        let pool = Arc::new(ConnectionPool::new());
        let supervisor = TaskSupervisor::new(pool);

        let err = supervisor.get_task_info("yhsf76ha").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Task with id=\"yhsf76ha\" not found in task list."
        );
    }

    #[tokio::test]
    async fn stop_task_on_unknown_id_fails() {
        let pool = Arc::new(ConnectionPool::new());
        let mut supervisor = TaskSupervisor::new(pool);
        let err = supervisor.stop_task("yhsf76ha").await.unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownTask { task_id } if task_id == "yhsf76ha"));
    }

    #[tokio::test]
    async fn get_all_tasks_is_empty_for_fresh_supervisor() {
        let pool = Arc::new(ConnectionPool::new());
        let supervisor = TaskSupervisor::new(pool);
        assert!(supervisor.get_all_tasks().is_empty());
    }
}
