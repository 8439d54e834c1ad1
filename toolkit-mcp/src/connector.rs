//! The transport-construction seam: an object-safe
//! `MCPConnector` trait the session manager drives, and the one concrete
//! implementation, `RmcpConnector`, covering stdio/SSE/streamable transports
//! via the `rmcp` crate.

use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::sse_client::SseClientConfig;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{SseClientTransport, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::config::{ClientInfo as ToolkitClientInfo, ConnectionConfig, Transport};
use crate::error::{McpError, McpResult};

/// A tool descriptor discovered from the remote MCP server, already
/// translated into plain JSON the rest of the toolkit understands.
#[derive(Debug, Clone)]
pub struct RemoteToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A live connection to an MCP server. Exists so the session manager never
/// touches `rmcp` types directly; swapping the connector implementation
/// (e.g. for a test double) only requires implementing this trait.
#[async_trait]
pub trait ConnectedClient: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>>;
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<Value>;
    async fn close(self: Box<Self>) -> McpResult<()>;
}

/// The external collaborator the session manager depends on to establish a
/// transport and perform the MCP initialize handshake.
#[async_trait]
pub trait MCPConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> McpResult<Box<dyn ConnectedClient>>;
}

/// `rmcp`-backed implementation. `connect()` performs both the transport
/// handshake and the MCP initialize exchange in a single `serve()` call;
/// the session manager's own `connect`/`initialize` steps model its own
/// state machine on top of that, not two separate wire round-trips.
#[derive(Debug, Default)]
pub struct RmcpConnector;

impl RmcpConnector {
    pub fn new() -> Self {
        Self
    }

    fn client_info(info: &ToolkitClientInfo) -> rmcp::model::ClientInfo {
        let normalized = info.normalized();
        rmcp::model::ClientInfo {
            protocol_version: Default::default(),
            capabilities: Default::default(),
            client_info: rmcp::model::Implementation {
                name: normalized.name,
                title: None,
                version: normalized.version,
                website_url: None,
                icons: None,
            },
        }
    }
}

#[async_trait]
impl MCPConnector for RmcpConnector {
    async fn connect(&self, config: &ConnectionConfig) -> McpResult<Box<dyn ConnectedClient>> {
        config.validate()?;
        let client_info = Self::client_info(&config.client_info);

        let service = match config.transport {
            Transport::Stdio => {
                let command = config
                    .command
                    .as_deref()
                    .ok_or_else(|| McpError::Configuration("stdio transport requires a command".to_string()))?;
                let mut cmd = Command::new(command);
                cmd.args(&config.args);
                let transport = TokioChildProcess::new(cmd)
                    .map_err(|e| McpError::Transport(format!("spawn stdio process: {e}")))?;
                tokio::time::timeout(config.timeout, client_info.serve(transport))
                    .await
                    .map_err(|_| McpError::Timeout)?
                    .map_err(|e| McpError::Transport(format!("stdio handshake: {e}")))?
            }
            Transport::Sse => {
                let url = config
                    .server_url
                    .as_deref()
                    .ok_or_else(|| McpError::Configuration("sse transport requires a server_url".to_string()))?;
                let http_client = build_http_client(config)?;
                let sse_config = SseClientConfig { sse_endpoint: url.into(), ..Default::default() };
                let transport = SseClientTransport::start_with_client(http_client, sse_config)
                    .await
                    .map_err(|e| McpError::Transport(format!("create SSE transport: {e}")))?;
                tokio::time::timeout(config.timeout, client_info.serve(transport))
                    .await
                    .map_err(|_| McpError::Timeout)?
                    .map_err(|e| McpError::Transport(format!("SSE handshake: {e}")))?
            }
            Transport::Streamable => {
                let url = config
                    .server_url
                    .as_deref()
                    .ok_or_else(|| McpError::Configuration("streamable transport requires a server_url".to_string()))?;
                let http_config = StreamableHttpClientTransportConfig::with_uri(url.to_string());
                let transport = StreamableHttpClientTransport::from_config(http_config);
                tokio::time::timeout(config.timeout, client_info.serve(transport))
                    .await
                    .map_err(|_| McpError::Timeout)?
                    .map_err(|e| McpError::Transport(format!("streamable handshake: {e}")))?
            }
        };

        info!(server_info = ?service.peer_info(), "MCP session connected");
        Ok(Box::new(RmcpConnectedClient { service }))
    }
}

fn build_http_client(config: &ConnectionConfig) -> McpResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if !config.headers.is_empty() {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::Configuration(format!("invalid header name {name}: {e}")))?;
            let header_value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| McpError::Configuration(format!("invalid header value for {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }
        builder = builder.default_headers(headers);
    }
    builder.build().map_err(|e| McpError::Transport(format!("build HTTP client: {e}")))
}

struct RmcpConnectedClient {
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl ConnectedClient for RmcpConnectedClient {
    async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>> {
        let result = self
            .service
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Transport(format!("list_tools: {e}")))?;

        Ok(result
            .tools
            .into_iter()
            .map(|tool| RemoteToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or("").to_string(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<Value> {
        let arguments = match arguments {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(McpError::ToolFailed {
                    tool: name.to_string(),
                    reason: format!("arguments must be a JSON object, got {other}"),
                })
            }
        };

        let result = self
            .service
            .call_tool(CallToolRequestParam { name: Cow::Owned(name.to_string()), arguments, task: None })
            .await
            .map_err(|e| McpError::ToolFailed { tool: name.to_string(), reason: e.to_string() })?;

        if result.is_error.unwrap_or(false) {
            let reason = result
                .content
                .iter()
                .filter_map(|c| serde_json::to_value(c).ok())
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(McpError::ToolFailed { tool: name.to_string(), reason });
        }

        if let Some(structured) = result.structured_content {
            return Ok(structured);
        }

        let content: Vec<Value> = result.content.iter().filter_map(|c| serde_json::to_value(c).ok()).collect();
        Ok(Value::Array(content))
    }

    async fn close(self: Box<Self>) -> McpResult<()> {
        self.service.cancel().await.map_err(|e| McpError::Transport(format!("cancel: {e}")))?;
        Ok(())
    }
}
