use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::models::Message;

use super::error::StoreResult;

/// Lightweight conversation metadata used for the sidebar list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
    #[serde(default)]
    pub message_count: usize,
}

/// Remote conversation service consumed by the engine.
///
/// Message persistence is server-side: a completed exchange is already
/// stored by the time the stream reports `Done`, so the store only lists,
/// fetches, deletes, and renames.
pub trait ConversationStore: Send + Sync + 'static {
    /// Load summaries for all conversations, most recently updated first.
    fn list(&self) -> BoxFuture<'static, StoreResult<Vec<ConversationSummary>>>;

    /// Load the full ordered history of one conversation.
    fn get_history(&self, id: &str) -> BoxFuture<'static, StoreResult<Vec<Message>>>;

    /// Delete a conversation.
    fn delete(&self, id: &str) -> BoxFuture<'static, StoreResult<()>>;

    /// Rename a conversation.
    fn rename(&self, id: &str, title: &str) -> BoxFuture<'static, StoreResult<()>>;
}
