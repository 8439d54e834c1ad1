//! The MCP `ToolSet`: binds a filter and a
//! [`SessionManager`] together, discovers remote tools, and adapts each one
//! into a `toolkit_core::CallableTool`.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use toolkit_core::filter::Filter;
use toolkit_core::schema::Schema;
use toolkit_core::tool::{CallableTool, Declaration, Tool};
use toolkit_core::toolset::{ToolHandle, ToolSet};
use toolkit_core::CoreError;
use tracing::warn;

use crate::connector::RemoteToolDescriptor;
use crate::session::SessionManager;

/// Parses a remote tool's raw JSON Schema into the local [`Schema`] type,
/// falling back to a bare `{"type": "object"}` when the server's schema
/// doesn't round-trip through our subset.
fn import_schema(name: &str, raw: &Value) -> Schema {
    serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
        warn!(tool = name, error = %err, "could not import MCP tool schema, falling back to a bare object schema");
        Schema::object()
    })
}

/// A single remote tool adapted to the local `CallableTool` contract.
pub struct McpTool {
    session: Arc<SessionManager>,
    descriptor: RemoteToolDescriptor,
}

impl McpTool {
    pub fn new(session: Arc<SessionManager>, descriptor: RemoteToolDescriptor) -> Self {
        Self { session, descriptor }
    }
}

impl Tool for McpTool {
    fn declaration(&self) -> Declaration {
        Declaration::new(
            self.descriptor.name.clone(),
            self.descriptor.description.clone(),
            import_schema(&self.descriptor.name, &self.descriptor.input_schema),
        )
    }
}

#[async_trait]
impl CallableTool for McpTool {
    async fn call(&self, json_args: &[u8]) -> Result<Value, CoreError> {
        let args: Value = if json_args.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(json_args)
                .map_err(|e| CoreError::InvalidArguments { tool: self.descriptor.name.clone(), reason: e.to_string() })?
        };

        self.session
            .call_tool(&self.descriptor.name, Some(args))
            .await
            .map_err(|e| CoreError::ToolFailed { tool: self.descriptor.name.clone(), reason: e.to_string() })
    }
}

/// A toolset backed by one MCP session, filtered by a [`Filter`]. Wrap with `toolkit_core::toolset::NamedToolSet::wrap` to get the
/// `"<toolsetName>_<originalName>"` prefixing.
///
/// `tools()` refreshes from the live session on every call and atomically
/// swaps the cache on success. When the refresh itself fails (the session
/// couldn't connect, `listTools` errored), the previous cache is returned
/// instead of the error — an empty cache on a fresh toolset still surfaces
/// the error since there's nothing to fall back to.
pub struct McpToolSet {
    name: String,
    session: Arc<SessionManager>,
    filter: Arc<dyn Filter>,
    cache: RwLock<Vec<ToolHandle>>,
}

impl McpToolSet {
    pub fn new(name: impl Into<String>, session: Arc<SessionManager>, filter: Arc<dyn Filter>) -> Self {
        Self { name: name.into(), session, filter, cache: RwLock::new(Vec::new()) }
    }
}

#[async_trait]
impl ToolSet for McpToolSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tools(&self) -> Result<Vec<ToolHandle>, CoreError> {
        let discovered = match self.session.list_tools().await {
            Ok(discovered) => discovered,
            Err(err) => {
                let cached = self.cache.read().await;
                if cached.is_empty() {
                    return Err(CoreError::ToolSet(err.to_string()));
                }
                warn!(toolset = %self.name, error = %err, "MCP tool refresh failed, serving previous cache");
                return Ok(cached.clone());
            }
        };

        let fresh: Vec<ToolHandle> = discovered
            .into_iter()
            .filter(|descriptor| self.filter.matches(&descriptor.name, &descriptor.description))
            .map(|descriptor| ToolHandle::callable(Arc::new(McpTool::new(self.session.clone(), descriptor))))
            .collect();

        *self.cache.write().await = fresh.clone();
        Ok(fresh)
    }

    async fn close(&self) -> Result<(), CoreError> {
        self.session.close().await.map_err(|e| CoreError::ToolSet(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connector::{ConnectedClient, MCPConnector};
    use crate::error::McpResult;
    use serde_json::json;
    use toolkit_core::filter::{Include, NoFilter};
    use toolkit_core::toolset::NamedToolSet;

    struct StubClient;

    #[async_trait]
    impl ConnectedClient for StubClient {
        async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>> {
            Ok(vec![
                RemoteToolDescriptor {
                    name: "read_file".to_string(),
                    description: "reads a file".to_string(),
                    input_schema: json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
                },
                RemoteToolDescriptor {
                    name: "write_file".to_string(),
                    description: "writes a file".to_string(),
                    input_schema: json!({"type": "object"}),
                },
            ])
        }

        async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<Value> {
            Ok(json!({"tool": name, "echo": arguments}))
        }

        async fn close(self: Box<Self>) -> McpResult<()> {
            Ok(())
        }
    }

    struct StubConnector;

    #[async_trait]
    impl MCPConnector for StubConnector {
        async fn connect(&self, _config: &ConnectionConfig) -> McpResult<Box<dyn ConnectedClient>> {
            Ok(Box::new(StubClient))
        }
    }

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(Arc::new(StubConnector), ConnectionConfig::stdio("true", vec![]), false, 3))
    }

    #[tokio::test]
    async fn discovers_and_calls_remote_tools() {
        let toolset = McpToolSet::new("fs", manager(), Arc::new(NoFilter));
        let tools = toolset.tools().await.unwrap();
        assert_eq!(tools.len(), 2);

        let result = tools[0].call(br#"{"path": "a.txt"}"#).await.unwrap();
        assert_eq!(result["tool"], json!("read_file"));
    }

    #[tokio::test]
    async fn filter_narrows_discovered_tools() {
        let toolset = McpToolSet::new("fs", manager(), Arc::new(Include::new(["read_file"])));
        let tools = toolset.tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].declaration().name, "read_file");
    }

    #[tokio::test]
    async fn named_wrapping_prefixes_tool_names() {
        let toolset: Arc<dyn ToolSet> = Arc::new(McpToolSet::new("fs", manager(), Arc::new(NoFilter)));
        let wrapped = NamedToolSet::wrap("fs", toolset);
        let tools = wrapped.tools().await.unwrap();
        assert!(tools.iter().any(|t| t.declaration().name == "fs_read_file"));
    }

    struct FlakyListClient {
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl ConnectedClient for FlakyListClient {
        async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>> {
            if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Ok(vec![RemoteToolDescriptor {
                    name: "read_file".to_string(),
                    description: "reads a file".to_string(),
                    input_schema: json!({"type": "object"}),
                }]);
            }
            Err(crate::error::McpError::ToolFailed { tool: "listTools".to_string(), reason: "server unavailable".to_string() })
        }

        async fn call_tool(&self, _name: &str, _arguments: Option<Value>) -> McpResult<Value> {
            unreachable!("not exercised by this test")
        }

        async fn close(self: Box<Self>) -> McpResult<()> {
            Ok(())
        }
    }

    struct FlakyListConnector;

    #[async_trait]
    impl MCPConnector for FlakyListConnector {
        async fn connect(&self, _config: &ConnectionConfig) -> McpResult<Box<dyn ConnectedClient>> {
            Ok(Box::new(FlakyListClient { calls: std::sync::atomic::AtomicU32::new(0) }))
        }
    }

    /// §4.8 step 6: a failed refresh serves the previous cache rather than
    /// propagating the error, as long as a previous successful cache exists.
    #[tokio::test]
    async fn refresh_failure_falls_back_to_previous_cache() {
        let session = Arc::new(SessionManager::new(Arc::new(FlakyListConnector), ConnectionConfig::stdio("true", vec![]), false, 3));
        let toolset = McpToolSet::new("fs", session, Arc::new(NoFilter));

        let first = toolset.tools().await.unwrap();
        assert_eq!(first.len(), 1);

        // The second call's listTools fails; the toolset should still
        // return the tools discovered on the first call.
        let second = toolset.tools().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].declaration().name, "read_file");
    }

    /// A refresh failure with no prior successful cache has nothing to fall
    /// back to, so the error surfaces.
    #[tokio::test]
    async fn refresh_failure_with_empty_cache_surfaces_the_error() {
        struct AlwaysFailListClient;
        #[async_trait]
        impl ConnectedClient for AlwaysFailListClient {
            async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>> {
                Err(crate::error::McpError::ToolFailed { tool: "listTools".to_string(), reason: "down".to_string() })
            }
            async fn call_tool(&self, _name: &str, _arguments: Option<Value>) -> McpResult<Value> {
                unreachable!("not exercised by this test")
            }
            async fn close(self: Box<Self>) -> McpResult<()> {
                Ok(())
            }
        }
        struct AlwaysFailListConnector;
        #[async_trait]
        impl MCPConnector for AlwaysFailListConnector {
            async fn connect(&self, _config: &ConnectionConfig) -> McpResult<Box<dyn ConnectedClient>> {
                Ok(Box::new(AlwaysFailListClient))
            }
        }

        let session = Arc::new(SessionManager::new(Arc::new(AlwaysFailListConnector), ConnectionConfig::stdio("true", vec![]), false, 3));
        let toolset = McpToolSet::new("fs", session, Arc::new(NoFilter));
        assert!(toolset.tools().await.is_err());
    }

    #[tokio::test]
    async fn bad_schema_falls_back_to_bare_object() {
        let descriptor = RemoteToolDescriptor {
            name: "weird".to_string(),
            description: "".to_string(),
            input_schema: json!("not an object schema"),
        };
        let schema = import_schema("weird", &descriptor.input_schema);
        assert_eq!(schema, Schema::object());
    }
}
