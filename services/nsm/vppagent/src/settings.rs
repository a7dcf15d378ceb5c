//! Commit handler settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to reach and prepare the vpp-agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSettings {
    /// Agent gRPC address (host:port)
    pub endpoint: String,
    /// Full-resync the agent with an empty configuration on connect
    pub reset_on_init: bool,
    /// Upper bound on waiting for the agent port
    pub connect_timeout_secs: u64,
    /// Pause between port probes
    pub connect_poll_interval_ms: u64,
    /// Timeout of the initial full resync
    pub reset_timeout_secs: u64,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9111".to_string(),
            reset_on_init: false,
            connect_timeout_secs: 120,
            connect_poll_interval_ms: 100,
            reset_timeout_secs: 120,
        }
    }
}

impl CommitSettings {
    /// Port wait bound
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Port probe interval
    pub fn connect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms)
    }

    /// Resync timeout
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}
