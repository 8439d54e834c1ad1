//! MCP connection configuration: `serde`-default structs, a `validate()`
//! method, builder-style `with_*` options.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::McpError;

/// The three transports the MCP ToolSet config accepts, plus the two
/// `streamable_http` aliases for `Streamable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Stdio,
    Sse,
    Streamable,
}

/// Parses a transport string, accepting `"streamable_http"` as an alias for
/// `Streamable`. Unknown values are rejected.
pub fn validate_transport(value: &str) -> Result<Transport, McpError> {
    match value {
        "stdio" => Ok(Transport::Stdio),
        "sse" => Ok(Transport::Sse),
        "streamable" | "streamable_http" => Ok(Transport::Streamable),
        other => Err(McpError::UnsupportedTransport { value: other.to_string() }),
    }
}

fn default_client_name() -> String {
    "toolkit-mcp".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// The client identity sent during MCP initialize. Defaults to a fixed
/// identifier when either field is blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default = "default_client_name")]
    pub name: String,
    #[serde(default = "default_client_version")]
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
        }
    }
}

impl ClientInfo {
    /// Applies the fixed default whenever a field is left blank, rather than
    /// sending an empty client identity to the server.
    pub fn normalized(&self) -> Self {
        Self {
            name: if self.name.trim().is_empty() { default_client_name() } else { self.name.clone() },
            version: if self.version.trim().is_empty() { default_client_version() } else { self.version.clone() },
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Connection configuration for one MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub transport: Transport,

    #[serde(default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default)]
    pub client_info: ClientInfo,
}

impl ConnectionConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: Transport::Stdio,
            server_url: None,
            headers: HashMap::new(),
            command: Some(command.into()),
            args,
            timeout: default_timeout(),
            client_info: ClientInfo::default(),
        }
    }

    pub fn sse(server_url: impl Into<String>) -> Self {
        Self {
            transport: Transport::Sse,
            server_url: Some(server_url.into()),
            headers: HashMap::new(),
            command: None,
            args: Vec::new(),
            timeout: default_timeout(),
            client_info: ClientInfo::default(),
        }
    }

    pub fn streamable(server_url: impl Into<String>) -> Self {
        Self {
            transport: Transport::Streamable,
            server_url: Some(server_url.into()),
            headers: HashMap::new(),
            command: None,
            args: Vec::new(),
            timeout: default_timeout(),
            client_info: ClientInfo::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    /// Fatal-configuration validation.
    pub fn validate(&self) -> Result<(), McpError> {
        match self.transport {
            Transport::Stdio => {
                if self.command.as_deref().unwrap_or("").is_empty() {
                    return Err(McpError::Configuration("stdio transport requires a command".to_string()));
                }
            }
            Transport::Sse | Transport::Streamable => {
                if self.server_url.as_deref().unwrap_or("").is_empty() {
                    return Err(McpError::Configuration(format!("{:?} transport requires a server_url", self.transport)));
                }
            }
        }
        Ok(())
    }
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

/// Reconnect policy: `maxReconnectAttempts` is always clamped to
/// `[1, 10]` regardless of the input value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReconnectConfig {
    #[serde(default)]
    pub enable_auto_reconnect: bool,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for SessionReconnectConfig {
    fn default() -> Self {
        Self {
            enable_auto_reconnect: false,
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl SessionReconnectConfig {
    /// `WithSessionReconnect(n)`: enables auto-reconnect and clamps `n` into
    /// `[1, 10]`.
    pub fn enabled(max_attempts: u32) -> Self {
        Self {
            enable_auto_reconnect: true,
            max_reconnect_attempts: max_attempts.clamp(1, 10),
        }
    }
}
