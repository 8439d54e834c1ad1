//! A named, lazily enumerated collection of tools with a close lifecycle,
//! plus the name-prefixing wrapper.

use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::stream::StreamReader;
use crate::tool::{CallableTool, Declaration, StreamableTool};

#[derive(Clone)]
enum ToolKind {
    Callable(Arc<dyn CallableTool>),
    Streamable(Arc<dyn StreamableTool>),
}

/// A uniform handle over either a callable or a streamable tool, with an
/// optional name override applied on top of the underlying declaration.
/// Cheaply [`Clone`]able (an `Arc` clone under the hood) so a [`ToolSet`]
/// can cache the previous successful enumeration and hand out copies of it
/// when a refresh fails.
#[derive(Clone)]
pub struct ToolHandle {
    name_override: Option<String>,
    kind: ToolKind,
}

impl ToolHandle {
    pub fn callable(tool: Arc<dyn CallableTool>) -> Self {
        Self {
            name_override: None,
            kind: ToolKind::Callable(tool),
        }
    }

    pub fn streamable(tool: Arc<dyn StreamableTool>) -> Self {
        Self {
            name_override: None,
            kind: ToolKind::Streamable(tool),
        }
    }

    pub fn declaration(&self) -> Declaration {
        let decl = match &self.kind {
            ToolKind::Callable(t) => t.declaration(),
            ToolKind::Streamable(t) => t.declaration(),
        };
        match &self.name_override {
            Some(name) => decl.renamed(name),
            None => decl,
        }
    }

    /// Returns a handle to the same underlying tool under a new exposed name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub async fn call(&self, json_args: &[u8]) -> CoreResult<Value> {
        match &self.kind {
            ToolKind::Callable(t) => t.call(json_args).await,
            ToolKind::Streamable(_) => Err(CoreError::NotCallable),
        }
    }

    pub async fn streamable_call(&self, json_args: &[u8]) -> CoreResult<StreamReader<Value>> {
        match &self.kind {
            ToolKind::Streamable(t) => t.streamable_call(json_args).await,
            ToolKind::Callable(_) => Err(CoreError::NotStreamable),
        }
    }
}

/// A named, enumerable collection of tools with a close lifecycle.
#[async_trait]
pub trait ToolSet: Send + Sync {
    fn name(&self) -> &str;
    async fn tools(&self) -> CoreResult<Vec<ToolHandle>>;
    async fn close(&self) -> CoreResult<()>;

    /// Needed only so [`NamedToolSet::wrap`] can detect and flatten an
    /// already-named toolset instead of double-prefixing.
    fn as_any(&self) -> &dyn Any;
}

/// Wraps a [`ToolSet`], rewriting every exposed declaration's name to
/// `"<toolset_name>_<original_name>"` (or just `original_name` when
/// `toolset_name` is empty).
pub struct NamedToolSet {
    toolset_name: String,
    inner: Arc<dyn ToolSet>,
}

impl NamedToolSet {
    /// Wraps `inner` under `toolset_name`. If `inner` is already a
    /// [`NamedToolSet`], its wrapping is flattened first so repeated
    /// wrapping never double-prefixes tool names.
    pub fn wrap(toolset_name: impl Into<String>, inner: Arc<dyn ToolSet>) -> Arc<dyn ToolSet> {
        let toolset_name = toolset_name.into();
        let unwrapped = match inner.as_any().downcast_ref::<NamedToolSet>() {
            Some(named) => named.inner.clone(),
            None => inner,
        };
        Arc::new(NamedToolSet {
            toolset_name,
            inner: unwrapped,
        })
    }
}

#[async_trait]
impl ToolSet for NamedToolSet {
    fn name(&self) -> &str {
        &self.toolset_name
    }

    async fn tools(&self) -> CoreResult<Vec<ToolHandle>> {
        let tools = self.inner.tools().await?;
        Ok(tools
            .into_iter()
            .map(|handle| {
                let original = handle.declaration().name;
                let prefixed = if self.toolset_name.is_empty() {
                    original
                } else {
                    format!("{}_{}", self.toolset_name, original)
                };
                handle.renamed(prefixed)
            })
            .collect())
    }

    async fn close(&self) -> CoreResult<()> {
        self.inner.close().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::schema::Schema;
    use crate::tool::Tool;
    use async_trait::async_trait;
    use serde_json::json;

    struct Sum;
    impl Tool for Sum {
        fn declaration(&self) -> Declaration {
            Declaration::new("sum", "adds numbers", Schema::object())
        }
    }
    #[async_trait]
    impl CallableTool for Sum {
        async fn call(&self, _json_args: &[u8]) -> CoreResult<Value> {
            Ok(json!(42))
        }
    }

    struct StreamOnly;
    impl Tool for StreamOnly {
        fn declaration(&self) -> Declaration {
            Declaration::new("watch", "streams events", Schema::object())
        }
    }
    #[async_trait]
    impl StreamableTool for StreamOnly {
        async fn streamable_call(&self, _json_args: &[u8]) -> CoreResult<StreamReader<Value>> {
            let (writer, reader) = crate::stream::stream(1);
            writer.close_send();
            Ok(reader)
        }
    }

    struct FixedToolSet {
        name: String,
        tools: Vec<&'static str>,
    }

    #[async_trait]
    impl ToolSet for FixedToolSet {
        fn name(&self) -> &str {
            &self.name
        }
        async fn tools(&self) -> CoreResult<Vec<ToolHandle>> {
            Ok(self
                .tools
                .iter()
                .map(|&name| {
                    if name == "watch" {
                        ToolHandle::streamable(Arc::new(StreamOnly))
                    } else {
                        ToolHandle::callable(Arc::new(Sum))
                    }
                })
                .collect())
        }
        async fn close(&self) -> CoreResult<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn prefixes_tool_names_with_toolset_name() {
        let inner = Arc::new(FixedToolSet {
            name: "math".to_string(),
            tools: vec!["sum"],
        });
        let wrapped = NamedToolSet::wrap("math", inner);
        let tools = wrapped.tools().await.unwrap();
        assert_eq!(tools[0].declaration().name, "math_sum");
        let result = tools[0].call(b"{}").await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn empty_toolset_name_leaves_name_unchanged() {
        let inner = Arc::new(FixedToolSet {
            name: "".to_string(),
            tools: vec!["sum"],
        });
        let wrapped = NamedToolSet::wrap("", inner);
        let tools = wrapped.tools().await.unwrap();
        assert_eq!(tools[0].declaration().name, "sum");
    }

    #[tokio::test]
    async fn double_wrapping_is_idempotent() {
        let inner = Arc::new(FixedToolSet {
            name: "fs".to_string(),
            tools: vec!["sum"],
        });
        let once = NamedToolSet::wrap("fs", inner);
        let twice = NamedToolSet::wrap("fs", once);
        let tools = twice.tools().await.unwrap();
        assert_eq!(tools[0].declaration().name, "fs_sum");
    }

    #[tokio::test]
    async fn calling_a_streaming_only_tool_is_not_callable() {
        let inner = Arc::new(FixedToolSet {
            name: "evt".to_string(),
            tools: vec!["watch"],
        });
        let wrapped = NamedToolSet::wrap("evt", inner);
        let tools = wrapped.tools().await.unwrap();
        let err = tools[0].call(b"{}").await.unwrap_err();
        assert!(matches!(err, CoreError::NotCallable));
    }
}
