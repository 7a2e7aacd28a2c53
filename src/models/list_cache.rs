use std::sync::Arc;

use parking_lot::Mutex;

use crate::repositories::{ConversationStore, ConversationSummary, StoreError};

/// Shared snapshot of the conversation list shown in the sidebar.
///
/// The engine's one hard obligation here is to refresh this exactly once
/// when a brand-new conversation receives its server identity; everything
/// else is bookkeeping for the UI.
#[derive(Clone, Default)]
pub struct ConversationListCache {
    inner: Arc<Mutex<Vec<ConversationSummary>>>,
}

impl ConversationListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ConversationSummary> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Replace the cached list, most recently updated first.
    pub fn apply(&self, mut list: Vec<ConversationSummary>) {
        list.sort_by_key(|c| std::cmp::Reverse(c.updated_at));
        *self.inner.lock() = list;
    }

    pub fn remove(&self, id: &str) {
        self.inner.lock().retain(|c| c.id != id);
    }

    pub fn rename(&self, id: &str, title: &str) {
        let mut list = self.inner.lock();
        if let Some(summary) = list.iter_mut().find(|c| c.id == id) {
            summary.title = title.to_string();
        }
    }

    /// Fetch the list from the store and replace the cache.
    pub async fn refresh(&self, store: &dyn ConversationStore) -> Result<usize, StoreError> {
        let list = store.list().await?;
        let count = list.len();
        self.apply(list);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, title: &str, updated_at: i64) -> ConversationSummary {
        ConversationSummary {
            id: id.to_string(),
            title: title.to_string(),
            updated_at,
            message_count: 0,
        }
    }

    #[test]
    fn test_apply_sorts_by_updated_at_descending() {
        let cache = ConversationListCache::new();
        cache.apply(vec![
            summary("a", "Older", 1000),
            summary("b", "Newer", 2000),
        ]);

        let list = cache.snapshot();
        assert_eq!(list[0].title, "Newer");
        assert_eq!(list[1].title, "Older");
    }

    #[test]
    fn test_remove_and_rename() {
        let cache = ConversationListCache::new();
        cache.apply(vec![summary("a", "One", 1), summary("b", "Two", 2)]);

        cache.rename("a", "One renamed");
        cache.remove("b");

        let list = cache.snapshot();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "One renamed");
    }
}
