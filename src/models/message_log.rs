use tracing::debug;

use crate::error::EngineError;

use super::message::{Message, Role};

/// Canonical ordered message list for the conversation currently displayed.
///
/// Invariant: at most one message is unfinalized at any time; if one exists
/// it is the last element and its role is assistant. Every mutator either
/// preserves the invariant or refuses the write.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the log for the UI to render.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    fn has_open_tail(&self) -> bool {
        self.messages.last().is_some_and(|m| !m.finalized)
    }

    /// Add a message to the end of the log.
    pub fn append(&mut self, message: Message) -> Result<(), EngineError> {
        if self.has_open_tail() {
            return Err(EngineError::InvariantViolation(
                "cannot append while an unfinalized assistant message is open".to_string(),
            ));
        }
        if !message.finalized && message.role != Role::Assistant {
            return Err(EngineError::InvariantViolation(
                "only assistant messages may be appended unfinalized".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Atomically add a finalized user message and its unfinalized assistant
    /// placeholder — the standard send shape. Readers never observe the user
    /// message alone.
    pub fn append_pair(&mut self, user: Message, placeholder: Message) -> Result<(), EngineError> {
        if self.has_open_tail() {
            return Err(EngineError::InvariantViolation(
                "cannot append a send pair while an unfinalized assistant message is open"
                    .to_string(),
            ));
        }
        if user.role != Role::User || !user.finalized {
            return Err(EngineError::InvariantViolation(
                "send pair must start with a finalized user message".to_string(),
            ));
        }
        if placeholder.role != Role::Assistant || placeholder.finalized {
            return Err(EngineError::InvariantViolation(
                "send pair must end with an unfinalized assistant placeholder".to_string(),
            ));
        }
        self.messages.push(user);
        self.messages.push(placeholder);
        Ok(())
    }

    /// Append `delta` to the last message if it is an unfinalized assistant
    /// reply. Anything else signals `StaleUpdate` so the caller can drop the
    /// write; the log is untouched. Hot path — called once per increment.
    pub fn patch_last(&mut self, delta: &str) -> Result<(), EngineError> {
        match self.messages.last_mut() {
            Some(last) if !last.finalized && last.role == Role::Assistant => {
                last.content.push_str(delta);
                Ok(())
            }
            _ => Err(EngineError::StaleUpdate),
        }
    }

    /// Mark the last message finalized. Idempotent; no-op on an empty log.
    pub fn finalize_last(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            last.finalized = true;
        }
    }

    /// Remove every message after `message_id`, keeping the target itself.
    pub fn truncate_after(&mut self, message_id: &str) -> Result<(), EngineError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| EngineError::NotFound(message_id.to_string()))?;
        self.messages.truncate(index + 1);
        Ok(())
    }

    /// Replace the content of `message_id` in place (edit-and-regenerate).
    pub fn update_content(&mut self, message_id: &str, content: &str) -> Result<(), EngineError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| EngineError::NotFound(message_id.to_string()))?;
        message.content = content.to_string();
        Ok(())
    }

    /// Bulk replace, used when switching conversations.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Empty the log, used for brand-new unbound conversations.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Rewrite every message still targeting an unbound conversation to the
    /// server-assigned id.
    pub fn bind_conversation(&mut self, id: &str) {
        for message in &mut self.messages {
            if message.conversation_id.is_unbound() {
                message.conversation_id = super::message::ConversationId::bound(id);
            }
        }
    }

    /// Supersede cleanup. An unfinalized tail left behind by a paused or
    /// superseded session either becomes a frozen finalized snapshot (it has
    /// streamed text) or is dropped outright (an empty placeholder that never
    /// received an increment).
    pub fn retire_unfinalized_tail(&mut self) {
        let drop_husk = match self.messages.last() {
            Some(last) if !last.finalized => last.content.is_empty(),
            _ => return,
        };
        if drop_husk {
            let husk = self.messages.pop();
            debug!(id = ?husk.map(|m| m.id), "removed empty streaming placeholder");
        } else {
            self.finalize_last();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ConversationId;

    fn user(content: &str) -> Message {
        Message::user(ConversationId::Unbound, content)
    }

    fn placeholder() -> Message {
        Message::placeholder(ConversationId::Unbound)
    }

    #[test]
    fn test_append_pair_makes_both_visible() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].role, Role::User);
        assert!(!log.messages()[1].finalized);
    }

    #[test]
    fn test_append_refused_while_tail_open() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();

        let err = log.append(user("again")).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_append_refuses_unfinalized_user() {
        let mut log = MessageLog::new();
        let mut msg = user("hi");
        msg.finalized = false;
        let err = log.append(msg).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn test_patch_last_concatenates_in_order() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();

        log.patch_last("Hel").unwrap();
        log.patch_last("lo ").unwrap();
        log.patch_last("there").unwrap();

        assert_eq!(log.last().unwrap().content, "Hello there");
    }

    #[test]
    fn test_patch_last_on_finalized_tail_is_stale_noop() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();
        log.patch_last("partial").unwrap();
        log.finalize_last();

        let err = log.patch_last("late").unwrap_err();
        assert!(matches!(err, EngineError::StaleUpdate));
        assert_eq!(log.last().unwrap().content, "partial");
    }

    #[test]
    fn test_finalize_last_is_idempotent() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();
        log.finalize_last();
        log.finalize_last();
        assert!(log.last().unwrap().finalized);
    }

    #[test]
    fn test_truncate_after_keeps_target() {
        let mut log = MessageLog::new();
        let u1 = user("one");
        let u2 = user("two");
        let u2_id = u2.id.clone();
        log.append(u1).unwrap();
        log.append(u2).unwrap();
        log.append(user("three")).unwrap();

        log.truncate_after(&u2_id).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().id, u2_id);
    }

    #[test]
    fn test_truncate_after_unknown_id_leaves_log_unchanged() {
        let mut log = MessageLog::new();
        log.append(user("one")).unwrap();

        let err = log.truncate_after("missing").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_bind_conversation_rewrites_unbound_only() {
        let mut log = MessageLog::new();
        log.append(user("one")).unwrap();
        log.append(Message::user(ConversationId::bound("c-old"), "two"))
            .unwrap();

        log.bind_conversation("c-42");

        assert_eq!(
            log.messages()[0].conversation_id,
            ConversationId::bound("c-42")
        );
        assert_eq!(
            log.messages()[1].conversation_id,
            ConversationId::bound("c-old")
        );
    }

    #[test]
    fn test_retire_tail_drops_empty_placeholder() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();

        log.retire_unfinalized_tail();

        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_retire_tail_freezes_partial_reply() {
        let mut log = MessageLog::new();
        log.append_pair(user("hi"), placeholder()).unwrap();
        log.patch_last("partial reply").unwrap();

        log.retire_unfinalized_tail();

        assert_eq!(log.len(), 2);
        let last = log.last().unwrap();
        assert!(last.finalized);
        assert_eq!(last.content, "partial reply");
    }
}
