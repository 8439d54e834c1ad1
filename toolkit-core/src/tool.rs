//! The `Tool`, `CallableTool`, and `StreamableTool` contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::schema::Schema;
use crate::stream::StreamReader;

/// The public projection of a tool exposed to the LLM: name, description,
/// and its input (and optional output) JSON Schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Schema>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
        }
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Every tool, callable or streamable, declares its own shape.
pub trait Tool: Send + Sync {
    fn declaration(&self) -> Declaration;
}

/// A tool invoked once per call, returning a single JSON result.
#[async_trait]
pub trait CallableTool: Tool {
    async fn call(&self, json_args: &[u8]) -> CoreResult<Value>;
}

/// A tool whose result arrives as a chunk stream rather than a single value.
#[async_trait]
pub trait StreamableTool: Tool {
    async fn streamable_call(&self, json_args: &[u8]) -> CoreResult<StreamReader<Value>>;
}
