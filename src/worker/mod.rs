//! Capture Worker (C2): drives one remote command over a leased SSH transport, copying its
//! stdout verbatim to a local file and its stderr to the log, until stopped or until the
//! remote command ends the stream.

mod capture;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::DumperError;
use crate::model::{Host, TaskType};
use crate::pool::ConnectionPool;

/// The two variants a capture worker can run; everything else about the worker is shared.
#[derive(Debug, Clone)]
pub enum CaptureKind {
    Log { dumped_file: String },
    Pcap { dumped_interface: String },
}

impl CaptureKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            CaptureKind::Log { .. } => TaskType::Log,
            CaptureKind::Pcap { .. } => TaskType::Pcap,
        }
    }

    pub fn name_prefix(&self) -> &'static str {
        match self {
            CaptureKind::Log { .. } => "log_",
            CaptureKind::Pcap { .. } => "pcap_",
        }
    }

    /// The bit-exact remote command for this variant (spec §6).
    pub fn remote_command(&self) -> String {
        match self {
            CaptureKind::Log { dumped_file } => {
                format!("tail --follow=name --retry --lines=1 {dumped_file}")
            }
            CaptureKind::Pcap { dumped_interface } => {
                format!("tcpdump -i {dumped_interface} -U -w - -f not tcp port 22")
            }
        }
    }
}

/// A plain value holding its own scheduling handle — not a `Thread` subclass. `start`/`stop`/
/// `is_alive` are ordinary methods operating on that handle (spec §9 redesign note).
pub struct Worker {
    name: String,
    task_type: TaskType,
    alive: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
    join_handle: Option<JoinHandle<()>>,
    last_error: Arc<parking_lot::Mutex<Option<DumperError>>>,
}

impl Worker {
    /// Launch the worker's execution context and return immediately. The caller (the
    /// supervisor) must not call `start` twice on the same `Worker`.
    pub fn start(
        name: String,
        kind: CaptureKind,
        pool: Arc<ConnectionPool>,
        host: Host,
        output_file: PathBuf,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let alive = Arc::new(AtomicBool::new(true));
        let task_type = kind.task_type();
        let last_error = Arc::new(parking_lot::Mutex::new(None));

        let alive_for_task = alive.clone();
        let last_error_for_task = last_error.clone();
        let worker_name = name.clone();
        let join_handle = tokio::spawn(async move {
            capture::run(
                worker_name,
                kind,
                pool,
                host,
                output_file,
                stop_rx,
                last_error_for_task,
            )
            .await;
            alive_for_task.store(false, Ordering::SeqCst);
        });

        Self {
            name,
            task_type,
            alive,
            stop_tx,
            join_handle: Some(join_handle),
            last_error,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// True between `start` returning and the worker's context fully exiting.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// The reason the worker terminated, if it terminated on its own rather than via `stop()`.
    pub fn last_error(&self) -> Option<DumperError> {
        self.last_error.lock().clone()
    }

    /// Set the stop flag and block until the worker has fully exited. Safe to call on a
    /// worker that is already terminating (or has already terminated).
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}
