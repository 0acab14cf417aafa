use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Receive buffer used by readers unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 16;
/// Ethernet-sized alternative for hosts that only exchange small packets.
pub const MTU_SIZE: usize = 1500;
pub const DEFAULT_REMOTE_HOST: &str = "localhost";
pub const DEFAULT_REMOTE_PORT: u16 = 10000;
pub const DEFAULT_RECEIVE_LIMIT: usize = 10;

/// String cache sizes for a [`Parser`](crate::Parser). A capacity of 0
/// disables that cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub path_cache_capacity: usize,
    pub type_tag_cache_capacity: usize,
    pub string_cache_capacity: usize,
    /// String arguments longer than this many bytes are decoded uncached.
    pub string_cache_max_key_len: usize,
}

impl ParserConfig {
    pub fn uncached() -> Self {
        Self {
            path_cache_capacity: 0,
            type_tag_cache_capacity: 0,
            string_cache_capacity: 0,
            string_cache_max_key_len: 0,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            path_cache_capacity: 64,
            type_tag_cache_capacity: 16,
            string_cache_capacity: 128,
            string_cache_max_key_len: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub bind_address: Ipv4Addr,
    pub local_port: u16,
    pub buffer_size: usize,
    pub parser: ParserConfig,
}

impl ReceiverConfig {
    pub fn on_port(local_port: u16) -> Self {
        Self {
            local_port,
            ..Default::default()
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            local_port: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            parser: ParserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub bind_address: Ipv4Addr,
    pub local_port: u16,
    pub default_remote_host: Option<String>,
    pub default_remote_port: u16,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            local_port: 0,
            default_remote_host: None,
            default_remote_port: DEFAULT_REMOTE_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveMode {
    /// Queued capsules are dispatched to handlers by `drain_pending`.
    #[default]
    Event,
    /// Queued capsules are left for `poll_received`.
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub receive_mode: ReceiveMode,
    pub bind_address: Ipv4Addr,
    pub local_port: u16,
    pub default_remote_host: String,
    pub default_remote_port: u16,
    /// Maximum queued capsules, and separately queued errors; 0 keeps everything.
    pub limit_receive_buffer: usize,
    pub buffer_size: usize,
    pub parser: ParserConfig,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            receive_mode: ReceiveMode::Event,
            bind_address: Ipv4Addr::UNSPECIFIED,
            local_port: 0,
            default_remote_host: DEFAULT_REMOTE_HOST.to_string(),
            default_remote_port: DEFAULT_REMOTE_PORT,
            limit_receive_buffer: DEFAULT_RECEIVE_LIMIT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            parser: ParserConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults() {
        let config = PortConfig::default();
        assert_eq!(config.receive_mode, ReceiveMode::Event);
        assert_eq!(config.default_remote_host, "localhost");
        assert_eq!(config.default_remote_port, 10000);
        assert_eq!(config.limit_receive_buffer, 10);
        assert_eq!(config.buffer_size, 65536);
    }

    #[test]
    fn yaml_round_trip() {
        let config = PortConfig {
            receive_mode: ReceiveMode::Poll,
            local_port: 9000,
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: PortConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let yaml = r#"
local_port: 8000
receive_mode: poll
parser:
  string_cache_capacity: 0
"#;
        let config: PortConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.local_port, 8000);
        assert_eq!(config.receive_mode, ReceiveMode::Poll);
        assert_eq!(config.parser.string_cache_capacity, 0);
        assert_eq!(config.parser.path_cache_capacity, 64);
        assert_eq!(config.default_remote_port, 10000);
    }
}
