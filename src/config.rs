//! Tunable knobs for the supervisor/front pair.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Front-side configuration: how long to wait for an RPC reply, and the default
/// capture interface for PCAP workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontConfig {
    /// Seconds to wait for a supervisor reply before failing with `RpcTimeout`.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Network interface tcpdump binds to when a PCAP task doesn't specify one.
    #[serde(default = "default_capture_interface")]
    pub default_capture_interface: String,
}

fn default_rpc_timeout_secs() -> u64 {
    5
}

fn default_capture_interface() -> String {
    "any".to_string()
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: default_rpc_timeout_secs(),
            default_capture_interface: default_capture_interface(),
        }
    }
}

impl FrontConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// The bounded-wait interval a capture worker polls its channel at. Fixed by the spec at
/// one second; kept as a named constant rather than a literal scattered through worker code.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Same cadence the supervisor's own command dispatch loop uses while idle.
pub const SUPERVISOR_IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = FrontConfig::default();
        assert_eq!(cfg.rpc_timeout_secs, 5);
        assert_eq!(cfg.default_capture_interface, "any");
    }
}
