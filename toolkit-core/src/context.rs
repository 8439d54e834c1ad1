//! The ambient per-call invocation context threaded into tools that need
//! more than their JSON arguments — primarily the memory tools, which must
//! resolve `{AppName, UserID, SessionID, State}` and a `MemoryService` handle
//! for the call in flight.
//!
//! This is an explicit, passed-by-reference context, not task-local storage
//! or a process-wide registry: the runtime builds one [`Invocation`] per
//! tool call and hands it to [`ContextualTool::call`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CoreResult;
use crate::tool::Declaration;

/// The session identity a tool call runs under. Mirrors the
/// `{AppName, UserID, SessionID, State}` projection the core reads from the
/// higher-level session object it otherwise treats as an external
/// collaborator.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub state: HashMap<String, Value>,
}

impl Session {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            state: HashMap::new(),
        }
    }
}

/// Ambient per-call context: a session plus a small type-erased service
/// registry. Services are looked up by concrete type, so a caller wanting a
/// `MemoryService` handle wraps it in a named newtype (see
/// `toolkit-memory::MemoryServiceHandle`) rather than registering a bare
/// trait object, since `Any` requires a concrete, sized type to downcast.
pub trait ToolContext: Send + Sync {
    fn session(&self) -> &Session;
    fn service_raw(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Convenience typed accessor layered over [`ToolContext::service_raw`].
pub trait ToolContextExt: ToolContext {
    fn service<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.service_raw(TypeId::of::<T>()).and_then(|svc| svc.downcast::<T>().ok())
    }
}

impl<C: ToolContext + ?Sized> ToolContextExt for C {}

/// A minimal, generally useful [`ToolContext`] implementation: a session and
/// a handful of registered services.
#[derive(Clone)]
pub struct Invocation {
    session: Session,
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Invocation {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            services: HashMap::new(),
        }
    }

    pub fn with_service<T: Any + Send + Sync>(mut self, service: Arc<T>) -> Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }
}

impl ToolContext for Invocation {
    fn session(&self) -> &Session {
        &self.session
    }

    fn service_raw(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.services.get(&type_id).cloned()
    }
}

/// A tool invoked with the ambient [`ToolContext`] threaded in explicitly,
/// rather than a plain [`crate::tool::CallableTool`]. Used by tools (like the
/// memory tools) whose implementation genuinely depends on per-call identity
/// or ambient services, as opposed to tools that are pure functions of their
/// JSON arguments.
#[async_trait::async_trait]
pub trait ContextualTool: Send + Sync {
    fn declaration(&self) -> Declaration;
    async fn call(&self, ctx: &dyn ToolContext, json_args: &[u8]) -> CoreResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag(bool);

    #[test]
    fn service_lookup_by_concrete_type() {
        let ctx = Invocation::new(Session::new("app", "user", "sess")).with_service(Arc::new(Flag(true)));
        let flag = ctx.service::<Flag>().unwrap();
        assert!(flag.0);
    }

    #[test]
    fn missing_service_is_none() {
        let ctx = Invocation::new(Session::new("app", "user", "sess"));
        assert!(ctx.service::<Flag>().is_none());
    }
}
