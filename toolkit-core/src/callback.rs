//! Before/after tool-call hooks. Each list runs in
//! registration order; a hook may short-circuit the remaining chain (and the
//! tool itself, for `before`) by returning a custom result.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::CoreResult;
use crate::tool::Declaration;

/// Runs ahead of a tool call. Returning `Ok(Some(custom))` skips the
/// remaining `before` callbacks and the tool implementation, handing
/// `custom` back to the caller as the tool result. Mutating `json_args` is
/// visible to later callbacks and to the tool.
#[async_trait]
pub trait BeforeCallback: Send + Sync {
    async fn before(
        &self,
        name: &str,
        declaration: &Declaration,
        json_args: &mut Vec<u8>,
    ) -> CoreResult<Option<Value>>;
}

/// Runs after a tool call (whether it succeeded or not). Same short-circuit
/// semantics as [`BeforeCallback`]. `run_err` carries the tool's own error,
/// if any, as a human-readable message (the concrete error type is already
/// gone by this point).
#[async_trait]
pub trait AfterCallback: Send + Sync {
    async fn after(
        &self,
        name: &str,
        declaration: &Declaration,
        json_args: &[u8],
        result: &Option<Value>,
        run_err: Option<&str>,
    ) -> CoreResult<Option<Value>>;
}

/// An ordered pair of before/after hook chains, invoked around a tool call.
#[derive(Default, Clone)]
pub struct CallbackChain {
    before: Vec<Arc<dyn BeforeCallback>>,
    after: Vec<Arc<dyn AfterCallback>>,
}

/// The outcome of running the `before` chain.
pub enum BeforeOutcome {
    /// No callback short-circuited; proceed with the tool call using
    /// (possibly mutated) arguments.
    Proceed(Vec<u8>),
    /// A callback supplied the result directly.
    Short(Value),
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before(mut self, callback: Arc<dyn BeforeCallback>) -> Self {
        self.before.push(callback);
        self
    }

    pub fn with_after(mut self, callback: Arc<dyn AfterCallback>) -> Self {
        self.after.push(callback);
        self
    }

    pub async fn run_before(
        &self,
        name: &str,
        declaration: &Declaration,
        json_args: &[u8],
    ) -> CoreResult<BeforeOutcome> {
        let mut args = json_args.to_vec();
        for callback in &self.before {
            if let Some(custom) = callback.before(name, declaration, &mut args).await? {
                debug!(tool = name, "before callback short-circuited, skipping remaining hooks and the tool call");
                return Ok(BeforeOutcome::Short(custom));
            }
        }
        Ok(BeforeOutcome::Proceed(args))
    }

    pub async fn run_after(
        &self,
        name: &str,
        declaration: &Declaration,
        json_args: &[u8],
        result: &Option<Value>,
        run_err: Option<&str>,
    ) -> CoreResult<Option<Value>> {
        for callback in &self.after {
            if let Some(custom) = callback
                .after(name, declaration, json_args, result, run_err)
                .await?
            {
                debug!(tool = name, "after callback short-circuited, skipping remaining hooks");
                return Ok(Some(custom));
            }
        }
        Ok(None)
    }
}
