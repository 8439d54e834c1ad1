//! Error taxonomy for the memory service and memory tools.

use thiserror::Error;

/// Result type used throughout `toolkit-memory`.
pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// Validation errors: empty keys.
    #[error("app name is required")]
    AppNameRequired,

    #[error("user id is required")]
    UserIdRequired,

    #[error("memory id is required")]
    MemoryIdRequired,

    /// Capacity error: `AddMemory` past the per-user limit.
    #[error("memory limit exceeded")]
    LimitExceeded,

    /// Not-found errors: `UpdateMemory`/`DeleteMemory`.
    #[error("user not found")]
    UserNotFound,

    #[error("memory not found")]
    MemoryNotFound,

    /// A tool-name configuration option (`WithCustomTool`/`WithToolEnabled`)
    /// named something outside the fixed registry. The service itself
    /// ignores this silently; this variant exists so a caller that
    /// explicitly validates a name gets a clear error instead.
    #[error("unknown tool name: {0}")]
    UnknownToolName(String),

    /// A memory tool's own required-field validation.
    #[error("{tool}: {field} is required")]
    MissingField { tool: String, field: String },

    /// The invocation context did not have a `MemoryService` wired in.
    #[error("memory service is not available")]
    MemoryServiceUnavailable,

    #[error("no session found for this invocation")]
    NoSession,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] toolkit_core::CoreError),
}
