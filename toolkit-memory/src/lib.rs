//! Per-(app, user) memory service, search tokenizer, instruction builder,
//! and the six memory tools built atop it.

pub mod entry;
pub mod error;
pub mod instruction;
pub mod search;
pub mod service;
pub mod tools;

pub use entry::{compute_memory_id, Entry, Key, MemoryBody, UserKey};
pub use error::{MemoryError, MemoryResult};
pub use instruction::default_instruction;
pub use search::{build_search_tokens, match_memory_entry};
pub use service::{InMemoryMemoryService, MemoryService, MemoryServiceBuilder, DEFAULT_MEMORY_LIMIT};
pub use tools::{
    MemoryAddTool, MemoryClearTool, MemoryDeleteTool, MemoryLoadTool, MemoryServiceHandle, MemorySearchTool,
    MemoryUpdateTool, DEFAULT_ENABLED_TOOLS, VALID_TOOL_NAMES,
};
