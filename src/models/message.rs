use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for client-assigned ids of streaming placeholder messages.
/// Server ids never use it, so a placeholder stays distinguishable until the
/// stream settles it.
pub const PROVISIONAL_ID_PREFIX: &str = "pending-";

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Identity of the conversation a message belongs to.
///
/// A conversation that exists only on the client is `Unbound`; the server
/// assigns a durable id with the first streamed exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConversationId {
    Unbound,
    Bound(String),
}

impl ConversationId {
    pub fn bound(id: impl Into<String>) -> Self {
        ConversationId::Bound(id.into())
    }

    pub fn is_unbound(&self) -> bool {
        matches!(self, ConversationId::Unbound)
    }

    pub fn as_bound(&self) -> Option<&str> {
        match self {
            ConversationId::Unbound => None,
            ConversationId::Bound(id) => Some(id),
        }
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        if value == "unbound" {
            ConversationId::Unbound
        } else {
            ConversationId::Bound(value)
        }
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        match value {
            ConversationId::Unbound => "unbound".to_string(),
            ConversationId::Bound(id) => id,
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationId::Unbound => f.write_str("unbound"),
            ConversationId::Bound(id) => f.write_str(id),
        }
    }
}

/// One turn in a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// False exactly while a streaming session is still appending here.
    pub finalized: bool,
}

impl Message {
    /// Optimistic user entry, timestamped client-side at insertion.
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            id: format!("local-{}", Uuid::new_v4()),
            conversation_id,
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            finalized: true,
        }
    }

    /// Empty, unfinalized assistant placeholder inserted on send and grown
    /// by increments until the session reports a terminal state.
    pub fn placeholder(conversation_id: ConversationId) -> Self {
        Self {
            id: format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4()),
            conversation_id,
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            finalized: false,
        }
    }

    /// Synthetic, immediately-finalized assistant notice for a failed stream.
    pub fn error_notice(conversation_id: ConversationId, detail: &str) -> Self {
        Self {
            id: format!("local-{}", Uuid::new_v4()),
            conversation_id,
            role: Role::Assistant,
            content: format!("Error: {detail}"),
            created_at: Utc::now(),
            finalized: true,
        }
    }

    /// True while the message still carries a client-assigned streaming id.
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_provisional_and_unfinalized() {
        let msg = Message::placeholder(ConversationId::Unbound);
        assert!(msg.is_provisional());
        assert!(!msg.finalized);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_error_notice_is_finalized_assistant() {
        let msg = Message::error_notice(ConversationId::bound("c-1"), "connection dropped");
        assert!(msg.finalized);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Error: connection dropped");
    }

    #[test]
    fn test_conversation_id_serde_sentinel() {
        let unbound = serde_json::to_string(&ConversationId::Unbound).unwrap();
        assert_eq!(unbound, "\"unbound\"");

        let parsed: ConversationId = serde_json::from_str("\"c-42\"").unwrap();
        assert_eq!(parsed, ConversationId::bound("c-42"));
    }
}
