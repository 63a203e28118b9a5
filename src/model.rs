//! Value records that cross the pool/worker/supervisor boundaries.

use serde::{Deserialize, Serialize};

/// Connection parameters for a remote host, as handed in by the (out of scope) host registry.
///
/// The core treats this as opaque connection parameters; `host_id`, `name` and `description`
/// are registry-layer bookkeeping the core never inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub host_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub ssh_address: String,
    pub ssh_port: u16,
    pub username: String,
    pub password: String,
}

/// The kind of remote command a capture worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[serde(rename = "log_dump")]
    Log,
    #[serde(rename = "pcap_dump")]
    Pcap,
}

/// A snapshot of a worker's state at the moment it was taken, not a live handle.
/// The authoritative state lives inside the supervisor's task table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub name: String,
    pub task_type: TaskType,
    pub is_alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_wire_values() {
        assert_eq!(serde_json::to_string(&TaskType::Log).unwrap(), "\"log_dump\"");
        assert_eq!(serde_json::to_string(&TaskType::Pcap).unwrap(), "\"pcap_dump\"");
    }

    #[test]
    fn task_round_trips_through_json() {
        let task = Task {
            task_id: "AB12CD34".to_string(),
            name: "proc_1.pcap_AB12CD34".to_string(),
            task_type: TaskType::Pcap,
            is_alive: true,
        };
        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.task_id, task.task_id);
        assert_eq!(decoded.task_type, task.task_type);
    }

    #[test]
    fn host_allows_absent_registry_fields() {
        let json = r#"{"ssh_address":"127.0.0.1","ssh_port":10022,"username":"test_user","password":"test_password"}"#;
        let host: Host = serde_json::from_str(json).unwrap();
        assert_eq!(host.host_id, None);
        assert_eq!(host.name, None);
    }
}
