//! Error types shared by the core tool model.

use thiserror::Error;

/// Result type used throughout `toolkit-core`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while declaring, invoking, or streaming a tool.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A tool call was rejected before the tool's own implementation ran.
    #[error("before-callback rejected call to {tool}: {reason}")]
    CallbackRejected { tool: String, reason: String },

    /// A `before`/`after` callback returned an error.
    #[error("callback error for tool {tool}: {reason}")]
    Callback { tool: String, reason: String },

    /// The tool implementation itself failed.
    #[error("tool {tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// A tool is not callable (e.g. only implements `StreamableTool`).
    #[error("tool is not callable")]
    NotCallable,

    /// A tool is not streamable.
    #[error("tool is not streamable")]
    NotStreamable,

    /// The argument bytes could not be parsed as JSON.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A toolset operation failed.
    #[error("toolset error: {0}")]
    ToolSet(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
