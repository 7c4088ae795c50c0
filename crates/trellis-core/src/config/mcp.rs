//! MCP transport configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP server surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Transport used to speak JSON-RPC with callers.
    #[serde(default)]
    pub transport: Transport,

    /// Bind host for the HTTP transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port for the HTTP transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// MCP transport kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Line-delimited JSON-RPC on stdin/stdout (desktop clients).
    #[default]
    Stdio,
    /// JSON-RPC over HTTP.
    Http,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl McpConfig {
    /// The socket address string for the HTTP transport.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_is_the_default_transport() {
        let config = McpConfig::default();
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn transport_parses_lowercase() {
        let config: McpConfig = serde_yaml::from_str("transport: http\nport: 8090").unwrap();
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.bind_address(), "127.0.0.1:8090");
    }
}
