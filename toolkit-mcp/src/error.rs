//! Error taxonomy for the MCP session manager and toolset.

use thiserror::Error;

/// Result type used throughout `toolkit-mcp`.
pub type McpResult<T> = Result<T, McpError>;

#[derive(Error, Debug)]
pub enum McpError {
    /// Validation errors: invalid transport, bad config.
    #[error("unsupported transport: {value}, supported: stdio, sse, streamable")]
    UnsupportedTransport { value: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Transport / session errors, reconnectable via
    /// `should_attempt_session_reconnect`.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("session_expired: {0}")]
    SessionExpired(String),

    #[error("client not initialized")]
    NotInitialized,

    /// Protocol/application errors: the tool-specific failure an MCP server
    /// returns. Not retried; the tool name is attached.
    #[error("tool {tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Recreating the session itself failed, or the caller's cancellation
    /// was observed between reconnect attempts. Exhausting the reconnect
    /// attempts without this happening surfaces the original operation
    /// error instead.
    #[error("reconnection aborted: {0}")]
    ReconnectionAborted(String),

    #[error("operation timed out")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] toolkit_core::CoreError),
}

impl McpError {
    /// The ten reconnectable substring patterns, checked against the error's rendered message. DNS failures,
    /// generic i/o timeouts, authentication failures, and bad requests are
    /// deliberately absent.
    const RECONNECTABLE_PATTERNS: &'static [&'static str] = &[
        "session_expired:",
        "transport is closed",
        "client not initialized",
        "not initialized",
        "connection refused",
        "connection reset",
        "EOF",
        "broken pipe",
        "HTTP 404",
        "session not found",
    ];

    /// Whether this error's message matches one of the reconnectable
    /// substring patterns, independent of `enableAutoReconnect` (that flag is
    /// checked separately by the session manager).
    pub fn is_reconnectable_pattern(&self) -> bool {
        let message = self.to_string();
        Self::RECONNECTABLE_PATTERNS.iter().any(|pattern| message.contains(pattern))
    }
}

/// Pure function form of `shouldAttemptSessionReconnect`,
/// usable against any rendered error message, not just [`McpError`]'s own
/// variants — the session manager also applies it to the raw string from a
/// connector-level failure.
pub fn should_attempt_session_reconnect(enable_auto_reconnect: bool, message: Option<&str>) -> bool {
    let Some(message) = message else { return false };
    if !enable_auto_reconnect {
        return false;
    }
    McpError::RECONNECTABLE_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnectable_patterns_match() {
        for pattern in McpError::RECONNECTABLE_PATTERNS {
            assert!(should_attempt_session_reconnect(true, Some(pattern)));
        }
    }

    #[test]
    fn non_reconnectable_messages_are_rejected() {
        for message in ["no such host", "i/o timeout", "authentication failed", "bad request"] {
            assert!(!should_attempt_session_reconnect(true, Some(message)));
        }
    }

    #[test]
    fn disabled_reconnect_never_matches() {
        assert!(!should_attempt_session_reconnect(false, Some("session_expired: x")));
    }

    #[test]
    fn no_error_never_matches() {
        assert!(!should_attempt_session_reconnect(true, None));
    }
}
