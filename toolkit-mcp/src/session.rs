//! The MCP session state machine: owns one
//! [`ConnectedClient`], exposes `connect`/`initialize`/`close`, and wraps
//! `listTools`/`callTool` in `executeWithSessionReconnect` so a transient
//! disconnect is transparently recovered instead of surfacing to the caller.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::connector::{ConnectedClient, MCPConnector, RemoteToolDescriptor};
use crate::error::{should_attempt_session_reconnect, McpError, McpResult};
use crate::singleflight::SingleFlight;

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Initialized,
    Closed,
}

/// Which kind of call `create_timeout_context` is deriving a budget for.
/// All three operations share the same configured budget; the distinction
/// exists so call sites read as intent rather than a bare `Duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Connect,
    ListTools,
    CallTool,
}

/// Runs `fut` under `timeout` when one is configured; runs it unwrapped
/// otherwise, so a `config.timeout == 0` means "no deadline" rather than
/// "expire immediately" per spec.md §4.7's `createTimeoutContext`.
async fn run_with_timeout<T>(timeout: Option<Duration>, fut: impl std::future::Future<Output = McpResult<T>>) -> McpResult<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut).await.map_err(|_| McpError::Timeout)?,
        None => fut.await,
    }
}

/// A cooperative cancellation flag, the Rust stand-in for the Go `ctx.Err()`
/// check `executeWithSessionReconnect` makes between reconnection attempts.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared with the reconnect closure. Lives behind `Arc` so
/// `recreate_session` can move owned clones into a `'static` future instead
/// of borrowing `&self` (the single-flight primitive requires `'static`).
struct Shared {
    connector: Arc<dyn MCPConnector>,
    config: ConnectionConfig,
    state: RwLock<SessionState>,
    client: RwLock<Option<Box<dyn ConnectedClient>>>,
}

pub struct SessionManager {
    shared: Arc<Shared>,
    reconnect_enabled: bool,
    max_reconnect_attempts: u32,
    reconnect_attempts: AtomicU32,
    reconnect_flight: SingleFlight<Result<(), Arc<McpError>>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn MCPConnector>, config: ConnectionConfig, enable_auto_reconnect: bool, max_reconnect_attempts: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                state: RwLock::new(SessionState::Disconnected),
                client: RwLock::new(None),
            }),
            reconnect_enabled: enable_auto_reconnect,
            max_reconnect_attempts: max_reconnect_attempts.clamp(1, 10),
            reconnect_attempts: AtomicU32::new(0),
            reconnect_flight: SingleFlight::new(),
        }
    }

    /// Builds a manager from a [`SessionReconnectConfig`] rather than its
    /// two constituent fields.
    pub fn with_reconnect_config(connector: Arc<dyn MCPConnector>, config: ConnectionConfig, reconnect: crate::config::SessionReconnectConfig) -> Self {
        Self::new(connector, config, reconnect.enable_auto_reconnect, reconnect.max_reconnect_attempts)
    }

    pub async fn state(&self) -> SessionState {
        *self.shared.state.read().await
    }

    /// Derives the per-operation timeout budget from the connection's
    /// configured timeout. `None` means no deadline is applied: a
    /// `config.timeout == 0` is "unconfigured", not "expire immediately".
    pub fn create_timeout_context(&self, _op: OperationKind) -> Option<Duration> {
        if self.shared.config.timeout.is_zero() {
            None
        } else {
            Some(self.shared.config.timeout)
        }
    }

    /// Establishes the transport. Transitions `Disconnected -> Connecting ->
    /// Connected`; rolls back to `Disconnected` on failure.
    pub async fn connect(&self) -> McpResult<()> {
        connect_shared(&self.shared, self.create_timeout_context(OperationKind::Connect)).await
    }

    /// Confirms initialization. The concrete [`crate::connector::RmcpConnector`]
    /// already performs the MCP initialize handshake inside `connect()`, so
    /// this step is a state-machine transition rather than a second round
    /// trip: `Connected -> Initialized`.
    pub async fn initialize(&self) -> McpResult<()> {
        initialize_shared(&self.shared).await
    }

    pub async fn close(&self) -> McpResult<()> {
        let client = self.shared.client.write().await.take();
        if let Some(client) = client {
            if let Err(err) = client.close().await {
                warn!(error = %err, "error closing MCP session, proceeding anyway");
            }
        }
        *self.shared.state.write().await = SessionState::Closed;
        Ok(())
    }

    async fn ensure_initialized(&self) -> McpResult<()> {
        match self.state().await {
            SessionState::Initialized => Ok(()),
            SessionState::Closed => Err(McpError::SessionExpired("session is closed".to_string())),
            _ => {
                self.connect().await?;
                self.initialize().await
            }
        }
    }

    pub async fn list_tools(&self) -> McpResult<Vec<RemoteToolDescriptor>> {
        let cancellation = CancellationToken::new();
        self.execute_with_session_reconnect(&cancellation, || async {
            self.ensure_initialized().await?;
            run_with_timeout(self.create_timeout_context(OperationKind::ListTools), async {
                let guard = self.shared.client.read().await;
                let client = guard.as_ref().ok_or(McpError::NotInitialized)?;
                client.list_tools().await
            })
            .await
        })
        .await
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<serde_json::Value>) -> McpResult<serde_json::Value> {
        let cancellation = CancellationToken::new();
        self.execute_with_session_reconnect(&cancellation, || async {
            self.ensure_initialized().await?;
            run_with_timeout(self.create_timeout_context(OperationKind::CallTool), async {
                let guard = self.shared.client.read().await;
                let client = guard.as_ref().ok_or(McpError::NotInitialized)?;
                client.call_tool(name, arguments.clone()).await
            })
            .await
        })
        .await
    }

    /// Runs `op`, and on a reconnectable failure, recreates the session
    /// (deduped across concurrent callers via [`SingleFlight`]) and retries,
    /// bounded by `max_reconnect_attempts`. Calls `op` at least once; when
    /// every reconnect attempt is exhausted, returns the *original* error
    /// from the first invocation rather than a reconnection-specific one.
    async fn execute_with_session_reconnect<F, Fut, T>(&self, cancellation: &CancellationToken, op: F) -> McpResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = McpResult<T>>,
    {
        let first_err = match op().await {
            Ok(value) => {
                self.reconnect_attempts.store(0, Ordering::SeqCst);
                return Ok(value);
            }
            Err(err) => err,
        };

        let first_message = first_err.to_string();
        if !should_attempt_session_reconnect(self.reconnect_enabled, Some(&first_message)) {
            return Err(first_err);
        }

        for attempt in 1..=self.max_reconnect_attempts {
            if cancellation.is_cancelled() {
                return Err(McpError::ReconnectionAborted("context cancelled between reconnect attempts".to_string()));
            }

            self.reconnect_attempts.store(attempt, Ordering::SeqCst);
            info!(attempt, max = self.max_reconnect_attempts, error = %first_message, "attempting MCP session reconnect");

            if let Err(recreate_err) = self.recreate_session().await {
                warn!(attempt, error = %recreate_err, "session recreation failed, will retry if attempts remain");
                continue;
            }

            match op().await {
                Ok(value) => {
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                    return Ok(value);
                }
                Err(err) => {
                    let message = err.to_string();
                    if !should_attempt_session_reconnect(self.reconnect_enabled, Some(&message)) {
                        return Err(err);
                    }
                }
            }
        }

        Err(first_err)
    }

    /// Tears down and rebuilds the transport. Concurrent callers observing
    /// the same failure collapse onto one reconnect attempt.
    pub async fn recreate_session(&self) -> McpResult<()> {
        let shared = self.shared.clone();
        let timeout = self.create_timeout_context(OperationKind::Connect);

        let result = self
            .reconnect_flight
            .run(move || async move {
                let taken = shared.client.write().await.take();
                if let Some(client) = taken {
                    let _ = client.close().await;
                }
                *shared.state.write().await = SessionState::Disconnected;

                let outcome: McpResult<()> = async {
                    connect_shared(&shared, timeout).await?;
                    initialize_shared(&shared).await
                }
                .await;
                outcome.map_err(Arc::new)
            })
            .await;

        result.map_err(|err| McpError::ReconnectionAborted(err.to_string()))
    }
}

async fn connect_shared(shared: &Shared, timeout: Option<Duration>) -> McpResult<()> {
    {
        let mut state = shared.state.write().await;
        if *state == SessionState::Connected || *state == SessionState::Initialized {
            return Ok(());
        }
        *state = SessionState::Connecting;
    }

    match run_with_timeout(timeout, shared.connector.connect(&shared.config)).await {
        Ok(client) => {
            *shared.client.write().await = Some(client);
            *shared.state.write().await = SessionState::Connected;
            Ok(())
        }
        Err(err) => {
            *shared.state.write().await = SessionState::Disconnected;
            Err(err)
        }
    }
}

async fn initialize_shared(shared: &Shared) -> McpResult<()> {
    let mut state = shared.state.write().await;
    match *state {
        SessionState::Connected => {
            *state = SessionState::Initialized;
            Ok(())
        }
        SessionState::Initialized => Ok(()),
        SessionState::Disconnected | SessionState::Connecting => Err(McpError::NotInitialized),
        SessionState::Closed => Err(McpError::SessionExpired("session is closed".to_string())),
    }
}
