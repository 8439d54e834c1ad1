//! Memory data model: `Entry`, `UserKey`, `Key`, and the content-addressed id
//! scheme.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MemoryError, MemoryResult};

/// Identifies a user's memory bucket within an app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub app_name: String,
    pub user_id: String,
}

impl UserKey {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>) -> MemoryResult<Self> {
        let app_name = app_name.into();
        let user_id = user_id.into();
        if app_name.is_empty() {
            return Err(MemoryError::AppNameRequired);
        }
        if user_id.is_empty() {
            return Err(MemoryError::UserIdRequired);
        }
        Ok(Self { app_name, user_id })
    }
}

/// Identifies one memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub app_name: String,
    pub user_id: String,
    pub memory_id: String,
}

impl Key {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>, memory_id: impl Into<String>) -> MemoryResult<Self> {
        let user_key = UserKey::new(app_name, user_id)?;
        let memory_id = memory_id.into();
        if memory_id.is_empty() {
            return Err(MemoryError::MemoryIdRequired);
        }
        Ok(Self {
            app_name: user_key.app_name,
            user_id: user_key.user_id,
            memory_id,
        })
    }

    pub fn user_key(&self) -> UserKey {
        UserKey {
            app_name: self.app_name.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// The mutable body of a memory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryBody {
    pub content: String,
    pub topics: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// One stored memory tuple for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub memory: MemoryBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The hex SHA-256 of `"memory:" + content + ("|topics:" + join(topics, ","))?`.
/// Equal `(content, topics)` in the same order yield the same id (topic
/// order is *not* normalized here), so re-adding an identical memory
/// overwrites in place rather than duplicating.
pub fn compute_memory_id(content: &str, topics: &[String]) -> String {
    let mut buf = format!("memory:{content}");
    if !topics.is_empty() {
        buf.push_str("|topics:");
        buf.push_str(&topics.join(","));
    }
    let digest = Sha256::digest(buf.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_and_topics_yield_identical_id() {
        let a = compute_memory_id("hello", &["x".to_string(), "y".to_string()]);
        let b = compute_memory_id("hello", &["x".to_string(), "y".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn topic_order_is_not_normalized() {
        let a = compute_memory_id("hello", &["a".to_string(), "b".to_string()]);
        let b = compute_memory_id("hello", &["b".to_string(), "a".to_string()]);
        assert_ne!(a, b, "topic order changes the id; order is not normalized");
    }

    #[test]
    fn empty_topics_omit_the_topics_segment() {
        let with_empty = compute_memory_id("hello", &[]);
        let direct = {
            let digest = Sha256::digest(b"memory:hello");
            digest.iter().map(|b| format!("{b:02x}")).collect::<String>()
        };
        assert_eq!(with_empty, direct);
    }

    #[test]
    fn user_key_rejects_empty_fields() {
        assert!(matches!(UserKey::new("", "u"), Err(MemoryError::AppNameRequired)));
        assert!(matches!(UserKey::new("a", ""), Err(MemoryError::UserIdRequired)));
    }

    #[test]
    fn key_rejects_empty_memory_id() {
        assert!(matches!(Key::new("a", "u", ""), Err(MemoryError::MemoryIdRequired)));
    }
}
