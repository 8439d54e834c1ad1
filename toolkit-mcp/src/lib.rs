//! MCP session management, transports, and the MCP-backed `ToolSet`.

pub mod config;
pub mod connector;
pub mod error;
pub mod session;
pub mod singleflight;
pub mod toolset;

pub use config::{ClientInfo, ConnectionConfig, SessionReconnectConfig, Transport};
pub use connector::{ConnectedClient, MCPConnector, RemoteToolDescriptor, RmcpConnector};
pub use error::{should_attempt_session_reconnect, McpError, McpResult};
pub use session::{OperationKind, SessionManager, SessionState};
pub use singleflight::SingleFlight;
pub use toolset::{McpTool, McpToolSet};
