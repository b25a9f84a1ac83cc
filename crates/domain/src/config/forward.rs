use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forward engine tuning.
///
/// `doh_head_start_ms` and `backup_delay_ms` are empirical values: plain
/// fallbacks for a known provider start `doh_head_start_ms` after its DoH
/// endpoint, and secondary addresses of the same family wait a further
/// `backup_delay_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    #[serde(default)]
    pub upstream_servers: Vec<String>,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_max_udp_response_bytes")]
    pub max_udp_response_bytes: u16,

    #[serde(default = "default_doh_head_start_ms")]
    pub doh_head_start_ms: u64,

    #[serde(default = "default_backup_delay_ms")]
    pub backup_delay_ms: u64,

    #[serde(default)]
    pub debug_send: bool,
}

impl ForwardConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn doh_head_start(&self) -> Duration {
        Duration::from_millis(self.doh_head_start_ms)
    }

    pub fn backup_delay(&self) -> Duration {
        Duration::from_millis(self.backup_delay_ms)
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            upstream_servers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
            query_timeout_ms: default_query_timeout_ms(),
            max_udp_response_bytes: default_max_udp_response_bytes(),
            doh_head_start_ms: default_doh_head_start_ms(),
            backup_delay_ms: default_backup_delay_ms(),
            debug_send: false,
        }
    }
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_max_udp_response_bytes() -> u16 {
    4095
}

fn default_doh_head_start_ms() -> u64 {
    500
}

fn default_backup_delay_ms() -> u64 {
    200
}
