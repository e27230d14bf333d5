use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use veritas_core::Turn;

use crate::error::Result;
use crate::store::ConversationStore;

/// In-memory conversation store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Vec<Turn>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's log, replacing anything already stored.
    pub async fn with_history(self, user_id: &str, turns: Vec<Turn>) -> Self {
        self.records.write().await.insert(user_id.to_string(), turns);
        self
    }

    /// Number of users with a stored log.
    pub async fn user_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Vec<Turn>> {
        Ok(self
            .records
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, turns: &[Turn]) -> Result<()> {
        self.records
            .write()
            .await
            .insert(user_id.to_string(), turns.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_user_loads_empty() {
        let store = MemoryStore::new();
        assert!(store.load("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemoryStore::new();
        store
            .save("u", &[Turn::user("a"), Turn::assistant("b")])
            .await
            .unwrap();
        store.save("u", &[Turn::user("c"), Turn::assistant("d")]).await.unwrap();

        let turns = store.load("u").await.unwrap();
        assert_eq!(turns, vec![Turn::user("c"), Turn::assistant("d")]);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = MemoryStore::new()
            .with_history("alice", vec![Turn::user("q"), Turn::assistant("a")])
            .await;
        assert_eq!(store.load("alice").await.unwrap().len(), 2);
        assert!(store.load("bob").await.unwrap().is_empty());
    }
}
