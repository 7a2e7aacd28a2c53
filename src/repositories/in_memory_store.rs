use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::models::Message;

use super::conversation_store::{ConversationStore, ConversationSummary};
use super::error::{StoreError, StoreResult};

#[derive(Clone)]
struct StoredConversation {
    summary: ConversationSummary,
    history: Vec<Message>,
}

/// In-memory store for conversations.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<Mutex<HashMap<String, StoredConversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation with its history.
    pub fn put(&self, summary: ConversationSummary, history: Vec<Message>) {
        self.conversations
            .lock()
            .insert(summary.id.clone(), StoredConversation { summary, history });
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn list(&self) -> BoxFuture<'static, StoreResult<Vec<ConversationSummary>>> {
        let conversations = self.conversations.clone();

        Box::pin(async move {
            let mut result: Vec<ConversationSummary> = conversations
                .lock()
                .values()
                .map(|c| c.summary.clone())
                .collect();

            // Sort by updated_at descending
            result.sort_by_key(|c| std::cmp::Reverse(c.updated_at));

            Ok(result)
        })
    }

    fn get_history(&self, id: &str) -> BoxFuture<'static, StoreResult<Vec<Message>>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();

        Box::pin(async move {
            conversations
                .lock()
                .get(&id)
                .map(|c| c.history.clone())
                .ok_or_else(|| StoreError::InvalidData {
                    message: format!("no conversation {id}"),
                })
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, StoreResult<()>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();

        Box::pin(async move {
            conversations.lock().remove(&id);
            Ok(())
        })
    }

    fn rename(&self, id: &str, title: &str) -> BoxFuture<'static, StoreResult<()>> {
        let conversations = self.conversations.clone();
        let id = id.to_string();
        let title = title.to_string();

        Box::pin(async move {
            let mut store = conversations.lock();
            let conversation = store.get_mut(&id).ok_or_else(|| StoreError::InvalidData {
                message: format!("no conversation {id}"),
            })?;
            conversation.summary.title = title;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationId;

    fn summary(id: &str, title: &str, updated_at: i64) -> ConversationSummary {
        ConversationSummary {
            id: id.to_string(),
            title: title.to_string(),
            updated_at,
            message_count: 0,
        }
    }

    #[tokio::test]
    async fn test_put_and_list_sorted_by_updated_at() {
        let store = InMemoryConversationStore::new();
        store.put(summary("c-1", "Older", 1000), vec![]);
        store.put(summary("c-2", "Newer", 2000), vec![]);

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Newer");
        assert_eq!(list[1].title, "Older");
    }

    #[tokio::test]
    async fn test_get_history_roundtrip() {
        let store = InMemoryConversationStore::new();
        let history = vec![Message::user(ConversationId::bound("c-1"), "hello")];
        store.put(summary("c-1", "Chat", 1000), history);

        let loaded = store.get_history("c-1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "hello");
    }

    #[tokio::test]
    async fn test_get_history_missing_conversation_fails() {
        let store = InMemoryConversationStore::new();
        assert!(store.get_history("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_rename() {
        let store = InMemoryConversationStore::new();
        store.put(summary("c-1", "One", 1000), vec![]);
        store.put(summary("c-2", "Two", 2000), vec![]);

        store.rename("c-1", "One renamed").await.unwrap();
        store.delete("c-2").await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "One renamed");
    }
}
