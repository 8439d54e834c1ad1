//! The six memory tools: add/update/delete/clear/search/load. Each is a
//! [`ContextualTool`] that resolves its `MemoryService` and `(appName,
//! userID)` from the ambient [`ToolContext`] at call time rather than
//! capturing them at construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use toolkit_core::context::{ToolContext, ToolContextExt};
use toolkit_core::{ContextualTool, CoreError, CoreResult, Declaration, Schema, SchemaBuilder};

use crate::entry::UserKey;
use crate::error::MemoryError;
use crate::service::MemoryService;

/// Registered under its concrete type in a [`ToolContext`] so memory tools
/// can fetch the service handle without the context needing to know about
/// `MemoryService` as a trait object (`Any` downcasting needs a concrete,
/// sized type).
pub struct MemoryServiceHandle(pub Arc<dyn MemoryService>);

fn to_core(err: MemoryError) -> CoreError {
    CoreError::ToolFailed {
        tool: "memory".to_string(),
        reason: err.to_string(),
    }
}

fn resolve_service(ctx: &dyn ToolContext) -> CoreResult<Arc<dyn MemoryService>> {
    ctx.service::<MemoryServiceHandle>()
        .map(|handle| handle.0.clone())
        .ok_or_else(|| to_core(MemoryError::MemoryServiceUnavailable))
}

fn resolve_user_key(ctx: &dyn ToolContext, tool: &str) -> CoreResult<UserKey> {
    let session = ctx.session();
    UserKey::new(session.app_name.clone(), session.user_id.clone()).map_err(|_| {
        CoreError::ToolFailed {
            tool: tool.to_string(),
            reason: MemoryError::NoSession.to_string(),
        }
    })
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, json_args: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(json_args).map_err(|e| CoreError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn missing_field(tool: &str, field: &str) -> CoreError {
    to_core(MemoryError::MissingField {
        tool: tool.to_string(),
        field: field.to_string(),
    })
}

// --- memory_add ---------------------------------------------------------

#[derive(Deserialize)]
struct AddInput {
    memory: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

#[derive(Serialize)]
struct AddOutput {
    message: String,
    memory: String,
    topics: Vec<String>,
}

pub struct MemoryAddTool;

fn add_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Save a new memory about the current user.")
        .field("memory", Schema::primitive("string").with_description("The fact or preference to remember."), true)
        .field(
            "topics",
            Schema::array(Schema::primitive("string")).with_description("Optional topic tags for later search."),
            false,
        )
        .build();
    Declaration::new("memory_add", "Store a new memory for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemoryAddTool {
    fn declaration(&self) -> Declaration {
        add_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let input: AddInput = parse_args("memory_add", json_args)?;
        let memory = input.memory.filter(|m| !m.is_empty()).ok_or_else(|| missing_field("memory_add", "memory"))?;
        let topics = input.topics.unwrap_or_default();

        let service = resolve_service(ctx)?;
        let key = resolve_user_key(ctx, "memory_add")?;
        let entry = service.add_memory(&key, &memory, topics.clone()).await.map_err(to_core)?;

        Ok(serde_json::to_value(AddOutput {
            message: "Memory saved.".to_string(),
            memory: entry.memory.content,
            topics,
        })?)
    }
}

// --- memory_update -------------------------------------------------------

#[derive(Deserialize)]
struct UpdateInput {
    memory_id: Option<String>,
    memory: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

#[derive(Serialize)]
struct UpdateOutput {
    message: String,
    memory_id: String,
    memory: String,
    topics: Vec<String>,
}

pub struct MemoryUpdateTool;

fn update_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Revise an existing memory.")
        .field("memory_id", Schema::primitive("string").with_description("The id of the memory to update."), true)
        .field("memory", Schema::primitive("string").with_description("The revised content."), true)
        .field("topics", Schema::array(Schema::primitive("string")), false)
        .build();
    Declaration::new("memory_update", "Update an existing memory for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemoryUpdateTool {
    fn declaration(&self) -> Declaration {
        update_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let input: UpdateInput = parse_args("memory_update", json_args)?;
        let memory_id = input.memory_id.filter(|m| !m.is_empty()).ok_or_else(|| missing_field("memory_update", "memory_id"))?;
        let memory = input.memory.filter(|m| !m.is_empty()).ok_or_else(|| missing_field("memory_update", "memory"))?;
        let topics = input.topics.unwrap_or_default();

        let service = resolve_service(ctx)?;
        let user_key = resolve_user_key(ctx, "memory_update")?;
        let key = crate::entry::Key::new(user_key.app_name, user_key.user_id, memory_id.clone()).map_err(to_core)?;
        let entry = service.update_memory(&key, &memory, topics.clone()).await.map_err(to_core)?;

        Ok(serde_json::to_value(UpdateOutput {
            message: "Memory updated.".to_string(),
            memory_id,
            memory: entry.memory.content,
            topics,
        })?)
    }
}

// --- memory_delete -------------------------------------------------------

#[derive(Deserialize)]
struct DeleteInput {
    memory_id: Option<String>,
}

#[derive(Serialize)]
struct DeleteOutput {
    message: String,
    memory_id: String,
}

pub struct MemoryDeleteTool;

fn delete_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Forget a specific memory.")
        .field("memory_id", Schema::primitive("string").with_description("The id of the memory to delete."), true)
        .build();
    Declaration::new("memory_delete", "Delete a specific memory for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemoryDeleteTool {
    fn declaration(&self) -> Declaration {
        delete_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let input: DeleteInput = parse_args("memory_delete", json_args)?;
        let memory_id = input.memory_id.filter(|m| !m.is_empty()).ok_or_else(|| missing_field("memory_delete", "memory_id"))?;

        let service = resolve_service(ctx)?;
        let user_key = resolve_user_key(ctx, "memory_delete")?;
        let key = crate::entry::Key::new(user_key.app_name, user_key.user_id, memory_id.clone()).map_err(to_core)?;
        service.delete_memory(&key).await.map_err(to_core)?;

        Ok(serde_json::to_value(DeleteOutput {
            message: "Memory deleted.".to_string(),
            memory_id,
        })?)
    }
}

// --- memory_clear --------------------------------------------------------

#[derive(Deserialize, Default)]
struct ClearInput {
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Serialize)]
struct ClearOutput {
    message: String,
}

pub struct MemoryClearTool;

fn clear_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Forget everything remembered about the current user.")
        .field("reason", Schema::primitive("string").with_description("Optional reason for clearing memories."), false)
        .build();
    Declaration::new("memory_clear", "Clear all memories for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemoryClearTool {
    fn declaration(&self) -> Declaration {
        clear_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let _input: ClearInput = if json_args.is_empty() {
            ClearInput::default()
        } else {
            parse_args("memory_clear", json_args)?
        };

        let service = resolve_service(ctx)?;
        let key = resolve_user_key(ctx, "memory_clear")?;
        service.clear_memories(&key).await.map_err(to_core)?;

        Ok(serde_json::to_value(ClearOutput {
            message: "All memories cleared.".to_string(),
        })?)
    }
}

// --- memory_search ---------------------------------------------------------

#[derive(Deserialize)]
struct SearchInput {
    query: Option<String>,
}

#[derive(Serialize)]
struct SearchResultItem {
    id: String,
    memory: String,
    topics: Vec<String>,
    created: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct SearchOutput {
    query: String,
    results: Vec<SearchResultItem>,
    count: usize,
}

pub struct MemorySearchTool;

fn search_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Search remembered facts about the current user.")
        .field("query", Schema::primitive("string").with_description("The search query."), true)
        .build();
    Declaration::new("memory_search", "Search memories for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemorySearchTool {
    fn declaration(&self) -> Declaration {
        search_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let input: SearchInput = parse_args("memory_search", json_args)?;
        let query = input.query.filter(|q| !q.is_empty()).ok_or_else(|| missing_field("memory_search", "query"))?;

        let service = resolve_service(ctx)?;
        let key = resolve_user_key(ctx, "memory_search")?;
        let entries = service.search_memories(&key, &query).await.map_err(to_core)?;

        let results: Vec<SearchResultItem> = entries
            .into_iter()
            .map(|e| SearchResultItem {
                id: e.id,
                memory: e.memory.content,
                topics: e.memory.topics,
                created: e.created_at,
            })
            .collect();
        let count = results.len();

        Ok(serde_json::to_value(SearchOutput { query, results, count })?)
    }
}

// --- memory_load ---------------------------------------------------------

const DEFAULT_LOAD_LIMIT: i64 = 10;

#[derive(Deserialize, Default)]
struct LoadInput {
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Serialize)]
struct LoadResultItem {
    id: String,
    memory: String,
    topics: Vec<String>,
    created: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct LoadOutput {
    limit: i64,
    results: Vec<LoadResultItem>,
    count: usize,
}

pub struct MemoryLoadTool;

fn load_declaration() -> Declaration {
    let schema = SchemaBuilder::new()
        .description("Load the current user's most recently updated memories.")
        .field(
            "limit",
            Schema::primitive("integer").with_description("Maximum number of memories to return (default 10)."),
            false,
        )
        .build();
    Declaration::new("memory_load", "Load recent memories for the current user.", schema)
}

#[async_trait]
impl ContextualTool for MemoryLoadTool {
    fn declaration(&self) -> Declaration {
        load_declaration()
    }

    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value> {
        let input: LoadInput = if json_args.is_empty() {
            LoadInput::default()
        } else {
            parse_args("memory_load", json_args)?
        };
        let limit = match input.limit {
            Some(l) if l > 0 => l,
            _ => DEFAULT_LOAD_LIMIT,
        };

        let service = resolve_service(ctx)?;
        let key = resolve_user_key(ctx, "memory_load")?;
        let entries = service.read_memories(&key, limit as usize).await.map_err(to_core)?;

        let results: Vec<LoadResultItem> = entries
            .into_iter()
            .map(|e| LoadResultItem {
                id: e.id,
                memory: e.memory.content,
                topics: e.memory.topics,
                created: e.created_at,
            })
            .collect();
        let count = results.len();

        Ok(serde_json::to_value(LoadOutput { limit, results, count })?)
    }
}

/// The fixed, validated tool-name registry.
pub const VALID_TOOL_NAMES: [&str; 6] = [
    "memory_add",
    "memory_update",
    "memory_delete",
    "memory_clear",
    "memory_search",
    "memory_load",
];

/// Tools enabled by default.
pub const DEFAULT_ENABLED_TOOLS: [&str; 4] = ["memory_add", "memory_update", "memory_search", "memory_load"];

pub fn default_factory(name: &str) -> Option<Arc<dyn ContextualTool>> {
    match name {
        "memory_add" => Some(Arc::new(MemoryAddTool)),
        "memory_update" => Some(Arc::new(MemoryUpdateTool)),
        "memory_delete" => Some(Arc::new(MemoryDeleteTool)),
        "memory_clear" => Some(Arc::new(MemoryClearTool)),
        "memory_search" => Some(Arc::new(MemorySearchTool)),
        "memory_load" => Some(Arc::new(MemoryLoadTool)),
        _ => None,
    }
}
