//! The in-memory reference `MemoryService`: a per-(app,
//! user) memory store with capped capacity, token search, and a lazily
//! instantiated tool surface.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use toolkit_core::ContextualTool;

use crate::entry::{compute_memory_id, Entry, Key, MemoryBody, UserKey};
use crate::error::{MemoryError, MemoryResult};
use crate::instruction::default_instruction;
use crate::search::match_memory_entry;
use crate::tools::{default_factory, DEFAULT_ENABLED_TOOLS, VALID_TOOL_NAMES};

/// Default per-user memory cap.
pub const DEFAULT_MEMORY_LIMIT: usize = 1000;

type ToolFactory = Arc<dyn Fn() -> Arc<dyn ContextualTool> + Send + Sync>;

/// A per-(app, user) memory store plus the tool surface built atop it.
/// Object-safe so callers can hold an `Arc<dyn MemoryService>` without
/// knowing the concrete backend.
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn add_memory(&self, key: &UserKey, content: &str, topics: Vec<String>) -> MemoryResult<Entry>;
    async fn update_memory(&self, key: &Key, content: &str, topics: Vec<String>) -> MemoryResult<Entry>;
    async fn delete_memory(&self, key: &Key) -> MemoryResult<()>;
    async fn clear_memories(&self, key: &UserKey) -> MemoryResult<()>;
    async fn read_memories(&self, key: &UserKey, limit: usize) -> MemoryResult<Vec<Entry>>;
    async fn search_memories(&self, key: &UserKey, query: &str) -> MemoryResult<Vec<Entry>>;

    /// Enabled tools in sorted name order, memoizing instances.
    async fn tools(&self) -> Vec<Arc<dyn ContextualTool>>;

    /// Composed prompt guidance for the currently enabled tool subset.
    fn generate_instruction(&self) -> String;
}

type UserBucket = HashMap<String, HashMap<String, Entry>>;

/// Builder for [`InMemoryMemoryService`].
pub struct MemoryServiceBuilder {
    limit: usize,
    tool_factories: HashMap<String, ToolFactory>,
    enabled: HashSet<String>,
    instruction_hook: Option<Arc<dyn Fn(&[String], &str) -> Option<String> + Send + Sync>>,
}

impl Default for MemoryServiceBuilder {
    fn default() -> Self {
        let mut tool_factories: HashMap<String, ToolFactory> = HashMap::new();
        for name in VALID_TOOL_NAMES {
            if let Some(tool) = default_factory(name) {
                tool_factories.insert(name.to_string(), Arc::new(move || tool.clone()));
            }
        }
        let enabled = DEFAULT_ENABLED_TOOLS.iter().map(|s| s.to_string()).collect();
        Self {
            limit: DEFAULT_MEMORY_LIMIT,
            tool_factories,
            enabled,
            instruction_hook: None,
        }
    }
}

impl MemoryServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Registers a custom tool factory for `name` and enables it. Ignored
    /// silently when `name` is outside the fixed registry.
    pub fn with_custom_tool<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ContextualTool> + Send + Sync + 'static,
    {
        if VALID_TOOL_NAMES.contains(&name) {
            self.tool_factories.insert(name.to_string(), Arc::new(factory));
            self.enabled.insert(name.to_string());
        } else {
            warn!(tool = name, "ignoring custom tool outside the valid registry");
        }
        self
    }

    /// Enables or disables `name`. Ignored silently when `name` is outside
    /// the fixed registry.
    pub fn with_tool_enabled(mut self, name: &str, enabled: bool) -> Self {
        if VALID_TOOL_NAMES.contains(&name) {
            if enabled {
                self.enabled.insert(name.to_string());
            } else {
                self.enabled.remove(name);
            }
        } else {
            warn!(tool = name, "ignoring tool-enabled option outside the valid registry");
        }
        self
    }

    pub fn with_instruction_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[String], &str) -> Option<String> + Send + Sync + 'static,
    {
        self.instruction_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Arc<InMemoryMemoryService> {
        Arc::new(InMemoryMemoryService {
            apps: RwLock::new(HashMap::new()),
            limit: self.limit,
            tool_factories: self.tool_factories,
            enabled: self.enabled,
            instruction_hook: self.instruction_hook,
            tool_cache: RwLock::new(HashMap::new()),
        })
    }
}

/// The in-memory reference implementation of [`MemoryService`].
pub struct InMemoryMemoryService {
    apps: RwLock<HashMap<String, Arc<RwLock<UserBucket>>>>,
    limit: usize,
    tool_factories: HashMap<String, ToolFactory>,
    enabled: HashSet<String>,
    instruction_hook: Option<Arc<dyn Fn(&[String], &str) -> Option<String> + Send + Sync>>,
    tool_cache: RwLock<HashMap<String, Arc<dyn ContextualTool>>>,
}

impl InMemoryMemoryService {
    pub fn builder() -> MemoryServiceBuilder {
        MemoryServiceBuilder::new()
    }

    /// Double-checked-locking lookup/creation of an app's user bucket.
    async fn app_bucket(&self, app_name: &str) -> Arc<RwLock<UserBucket>> {
        if let Some(bucket) = self.apps.read().await.get(app_name) {
            return bucket.clone();
        }
        let mut apps = self.apps.write().await;
        apps.entry(app_name.to_string()).or_insert_with(|| Arc::new(RwLock::new(HashMap::new()))).clone()
    }

    fn sorted_enabled_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.enabled.iter().cloned().collect();
        names.sort();
        names
    }
}

fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.created_at.cmp(&a.created_at)));
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn add_memory(&self, key: &UserKey, content: &str, topics: Vec<String>) -> MemoryResult<Entry> {
        let bucket = self.app_bucket(&key.app_name).await;
        let mut users = bucket.write().await;
        let user_entries = users.entry(key.user_id.clone()).or_default();

        // Preserved quirk: a re-add of the exact
        // same (content, topics) is idempotent via the content-hashed id,
        // yet it still fails against a full cap even though the store size
        // would not actually grow.
        if user_entries.len() >= self.limit {
            warn!(app = %key.app_name, user = %key.user_id, limit = self.limit, "memory limit exceeded");
            return Err(MemoryError::LimitExceeded);
        }

        let id = compute_memory_id(content, &topics);
        let now = Utc::now();
        let entry = Entry {
            id: id.clone(),
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            memory: MemoryBody {
                content: content.to_string(),
                topics,
                last_updated: now,
            },
            created_at: now,
            updated_at: now,
        };
        debug!(app = %key.app_name, user = %key.user_id, id = %id, "memory added");
        user_entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn update_memory(&self, key: &Key, content: &str, topics: Vec<String>) -> MemoryResult<Entry> {
        let bucket = self.app_bucket(&key.app_name).await;
        let mut users = bucket.write().await;
        let user_entries = users.get_mut(&key.user_id).ok_or(MemoryError::UserNotFound)?;
        let entry = user_entries.get_mut(&key.memory_id).ok_or(MemoryError::MemoryNotFound)?;

        let now = Utc::now();
        entry.memory.content = content.to_string();
        entry.memory.topics = topics;
        entry.memory.last_updated = now;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn delete_memory(&self, key: &Key) -> MemoryResult<()> {
        let bucket = self.app_bucket(&key.app_name).await;
        let mut users = bucket.write().await;
        let user_entries = users.get_mut(&key.user_id).ok_or(MemoryError::UserNotFound)?;
        user_entries.remove(&key.memory_id).ok_or(MemoryError::MemoryNotFound)?;
        Ok(())
    }

    async fn clear_memories(&self, key: &UserKey) -> MemoryResult<()> {
        let bucket = self.app_bucket(&key.app_name).await;
        let mut users = bucket.write().await;
        users.remove(&key.user_id);
        Ok(())
    }

    async fn read_memories(&self, key: &UserKey, limit: usize) -> MemoryResult<Vec<Entry>> {
        let bucket = self.app_bucket(&key.app_name).await;
        let users = bucket.read().await;
        let mut entries: Vec<Entry> = users.get(&key.user_id).map(|m| m.values().cloned().collect()).unwrap_or_default();
        sort_entries(&mut entries);
        if limit > 0 {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn search_memories(&self, key: &UserKey, query: &str) -> MemoryResult<Vec<Entry>> {
        let bucket = self.app_bucket(&key.app_name).await;
        let users = bucket.read().await;
        let mut entries: Vec<Entry> = users
            .get(&key.user_id)
            .map(|m| m.values().filter(|e| match_memory_entry(e, query)).cloned().collect())
            .unwrap_or_default();
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn tools(&self) -> Vec<Arc<dyn ContextualTool>> {
        let names = self.sorted_enabled_names();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(cached) = self.tool_cache.read().await.get(&name) {
                out.push(cached.clone());
                continue;
            }
            if let Some(factory) = self.tool_factories.get(&name) {
                let instance = factory();
                self.tool_cache.write().await.insert(name, instance.clone());
                out.push(instance);
            }
        }
        out
    }

    fn generate_instruction(&self) -> String {
        let enabled = self.sorted_enabled_names();
        let default_text = default_instruction(&enabled);
        if let Some(hook) = &self.instruction_hook {
            if let Some(text) = hook(&enabled, &default_text) {
                if !text.is_empty() {
                    return text;
                }
            }
        }
        default_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinSet;

    fn uk(app: &str, user: &str) -> UserKey {
        UserKey::new(app, user).unwrap()
    }

    #[tokio::test]
    async fn s1_memory_round_trip() {
        let service = InMemoryMemoryService::builder().build();
        let key = uk("app", "u1");
        let entry = service.add_memory(&key, "User likes coffee", vec!["preferences".to_string()]).await.unwrap();

        let read = service.read_memories(&key, 1).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].memory.content, "User likes coffee");

        let full_key = Key::new("app", "u1", entry.id.clone()).unwrap();
        service
            .update_memory(&full_key, "User loves coffee and tea", vec!["preferences".to_string(), "beverages".to_string()])
            .await
            .unwrap();
        let read = service.read_memories(&key, 10).await.unwrap();
        assert_eq!(read[0].memory.content, "User loves coffee and tea");

        service.delete_memory(&full_key).await.unwrap();
        let read = service.read_memories(&key, 10).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn s2_search() {
        let service = InMemoryMemoryService::builder().build();
        let key = uk("app", "u1");
        service.add_memory(&key, "Alice likes coffee", vec![]).await.unwrap();
        service.add_memory(&key, "Bob plays tennis", vec![]).await.unwrap();
        service.add_memory(&key, "Coffee brewing tips", vec![]).await.unwrap();

        assert_eq!(service.search_memories(&key, "coffee").await.unwrap().len(), 2);
        assert_eq!(service.search_memories(&key, "sports").await.unwrap().len(), 0);
        assert_eq!(service.search_memories(&key, "tennis").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn s3_limit() {
        let service = InMemoryMemoryService::builder().with_limit(2).build();
        let key = uk("app", "u1");
        service.add_memory(&key, "one", vec![]).await.unwrap();
        service.add_memory(&key, "two", vec![]).await.unwrap();
        let err = service.add_memory(&key, "three", vec![]).await.unwrap_err();
        assert!(matches!(err, MemoryError::LimitExceeded));
        assert_eq!(service.read_memories(&key, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn idempotent_readd_still_fails_against_a_full_cap() {
        // Preserved, not "fixed" — see the idempotent-readd note on add_memory.
        let service = InMemoryMemoryService::builder().with_limit(1).build();
        let key = uk("app", "u1");
        service.add_memory(&key, "same", vec![]).await.unwrap();
        let err = service.add_memory(&key, "same", vec![]).await.unwrap_err();
        assert!(matches!(err, MemoryError::LimitExceeded));
    }

    #[tokio::test]
    async fn default_tools_are_add_update_search_load() {
        let service = InMemoryMemoryService::builder().build();
        let tools = service.tools().await;
        let mut names: Vec<String> = tools.iter().map(|t| t.declaration().name).collect();
        names.sort();
        assert_eq!(names, vec!["memory_add", "memory_load", "memory_search", "memory_update"]);
    }

    #[tokio::test]
    async fn tool_enabled_false_removes_it() {
        let service = InMemoryMemoryService::builder().with_tool_enabled("memory_add", false).build();
        let tools = service.tools().await;
        let names: Vec<String> = tools.iter().map(|t| t.declaration().name).collect();
        assert!(!names.contains(&"memory_add".to_string()));
    }

    #[tokio::test]
    async fn concurrent_adds_yield_exact_total_count() {
        let service = InMemoryMemoryService::builder().with_limit(10_000).build();
        let key = uk("app", "u1");
        let producers = 4;
        let items_per_producer = 25;
        let mut set = JoinSet::new();
        for p in 0..producers {
            let service = service.clone();
            let key = key.clone();
            set.spawn(async move {
                for i in 0..items_per_producer {
                    service.add_memory(&key, &format!("memory-{p}-{i}"), vec![]).await.unwrap();
                }
            });
        }
        while set.join_next().await.is_some() {}
        let all = service.read_memories(&key, 0).await.unwrap();
        assert_eq!(all.len(), producers * items_per_producer);
    }
}
