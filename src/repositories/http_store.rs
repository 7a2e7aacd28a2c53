use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::Method;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::models::{ConversationId, Message, Role};

use super::conversation_store::{ConversationStore, ConversationSummary};
use super::error::{StoreError, StoreResult};

/// Wire shape of one stored message, as the conversation service returns it.
#[derive(Debug, Deserialize)]
struct MessageRecord {
    id: String,
    chat_id: String,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: ConversationId::Bound(self.chat_id),
            role: self.role,
            content: self.content,
            created_at: self.created_at,
            // History is settled text; only live sessions stream.
            finalized: true,
        }
    }
}

fn check_status(response: &reqwest::Response) -> StoreResult<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(StoreError::InvalidData {
            message: format!("conversation service returned {status}"),
        })
    }
}

/// REST-backed conversation store.
pub struct HttpConversationStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpConversationStore {
    pub fn new(config: &EngineConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

impl ConversationStore for HttpConversationStore {
    fn list(&self) -> BoxFuture<'static, StoreResult<Vec<ConversationSummary>>> {
        let request = self.request(Method::GET, "/chats");

        Box::pin(async move {
            let response = request.send().await?;
            check_status(&response)?;
            let mut list: Vec<ConversationSummary> = response.json().await?;
            list.sort_by_key(|c| std::cmp::Reverse(c.updated_at));
            Ok(list)
        })
    }

    fn get_history(&self, id: &str) -> BoxFuture<'static, StoreResult<Vec<Message>>> {
        let request = self.request(Method::GET, &format!("/chats/{id}/messages"));

        Box::pin(async move {
            let response = request.send().await?;
            check_status(&response)?;
            let records: Vec<MessageRecord> = response.json().await?;
            Ok(records.into_iter().map(MessageRecord::into_message).collect())
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, StoreResult<()>> {
        let request = self.request(Method::DELETE, &format!("/chats/{id}"));

        Box::pin(async move {
            let response = request.send().await?;
            check_status(&response)
        })
    }

    fn rename(&self, id: &str, title: &str) -> BoxFuture<'static, StoreResult<()>> {
        let request = self
            .request(Method::PATCH, &format!("/chats/{id}"))
            .json(&serde_json::json!({ "title": title }));

        Box::pin(async move {
            let response = request.send().await?;
            check_status(&response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_record_converts_to_finalized_message() {
        let record: MessageRecord = serde_json::from_str(
            r#"{
                "id": "m-1",
                "chat_id": "c-1",
                "role": "assistant",
                "content": "hello",
                "created_at": "2026-01-15T10:30:00Z"
            }"#,
        )
        .unwrap();

        let message = record.into_message();
        assert_eq!(message.conversation_id, ConversationId::bound("c-1"));
        assert_eq!(message.role, Role::Assistant);
        assert!(message.finalized);
        assert!(!message.is_provisional());
    }
}
