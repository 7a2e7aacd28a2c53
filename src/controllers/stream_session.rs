use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, warn};

use crate::models::{CancelHandle, ConversationId, Message};
use crate::services::completion::{CompletionClient, StreamEvent};

use super::conversation_controller::{ControllerState, EngineEvent, EngineShared};

/// Lifecycle status of a streaming exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

/// One in-flight request/response exchange.
///
/// A session is owned by the controller that started it and reports exactly
/// one terminal status. Every log write goes through the cancellation and
/// generation checks, so a superseded session stops writing even while its
/// transport keeps delivering.
pub struct StreamSession {
    shared: Arc<EngineShared>,
    completion: Arc<dyn CompletionClient>,
    conversation: ConversationId,
    content: String,
    generation: u64,
    cancel: CancelHandle,
    bound: bool,
}

impl StreamSession {
    pub(crate) fn new(
        shared: Arc<EngineShared>,
        completion: Arc<dyn CompletionClient>,
        conversation: ConversationId,
        content: String,
        generation: u64,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            shared,
            completion,
            conversation,
            content,
            generation,
            cancel,
            bound: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drive the exchange to its terminal status.
    pub async fn run(mut self) -> SessionStatus {
        debug!(
            generation = self.generation,
            conversation = %self.conversation,
            "opening completion stream"
        );
        let open = self.completion.open(
            self.conversation.clone(),
            self.content.clone(),
            self.cancel.clone(),
        );
        let mut events = match open.await {
            Ok(events) => events,
            Err(e) => return self.fail(e.to_string()),
        };

        while let Some(event) = events.next().await {
            if self.cancel.is_triggered() {
                return self.finish_cancelled();
            }
            if !self.shared.registry.is_current(self.generation) {
                debug!(
                    generation = self.generation,
                    "dropping event from superseded session"
                );
                return self.finish_cancelled();
            }
            match event {
                Ok(StreamEvent::Increment(text)) => self.apply_increment(&text),
                Ok(StreamEvent::BoundIdentity(id)) => self.bind_identity(id),
                Ok(StreamEvent::Done) => return self.finish_completed(),
                Ok(StreamEvent::Error(message)) => return self.fail(message),
                Err(e) => return self.fail(e.to_string()),
            }
        }

        // The transport closed without a Done event: the connection dropped
        // mid-reply.
        self.fail("stream ended before completion".to_string())
    }

    fn apply_increment(&self, text: &str) {
        let mut log = self.shared.log.lock();
        match log.patch_last(text) {
            Ok(()) => {}
            Err(e) => {
                debug!(
                    generation = self.generation,
                    error = %e,
                    "dropped increment against a settled log tail"
                );
            }
        }
    }

    /// The first increment carrying a server identity binds the conversation
    /// and fires the one-time list refresh; later identities are ignored.
    fn bind_identity(&mut self, id: String) {
        if self.bound || !self.conversation.is_unbound() {
            return;
        }
        self.bound = true;
        debug!(conversation_id = %id, "binding conversation identity");
        self.conversation = ConversationId::bound(&id);
        self.shared.log.lock().bind_conversation(&id);
        {
            let mut active = self.shared.active.lock();
            if active.is_unbound() {
                *active = ConversationId::bound(&id);
            }
        }
        self.shared.emit(EngineEvent::ConversationBound {
            conversation_id: id,
        });

        // Best-effort, non-blocking list refresh. A result arriving after a
        // newer intent is discarded by the generation check.
        let shared = Arc::clone(&self.shared);
        let token = self.generation;
        tokio::spawn(async move {
            match shared.store.list().await {
                Ok(list) if shared.registry.is_current(token) => {
                    let count = list.len();
                    shared.list_cache.apply(list);
                    shared.emit(EngineEvent::ListRefreshed { count });
                }
                Ok(_) => debug!("discarding stale conversation list refresh"),
                Err(e) => warn!(error = ?e, "conversation list refresh failed"),
            }
        });
    }

    fn finish_completed(self) -> SessionStatus {
        self.shared.log.lock().finalize_last();
        self.finish(SessionStatus::Completed)
    }

    fn finish_cancelled(self) -> SessionStatus {
        // No log mutation beyond what already streamed in.
        self.finish(SessionStatus::Cancelled)
    }

    fn fail(self, message: String) -> SessionStatus {
        if self.cancel.is_triggered() {
            // A failure observed after cancellation is not a user-visible
            // error.
            return self.finish(SessionStatus::Cancelled);
        }
        error!(generation = self.generation, error = %message, "stream failed");
        {
            let mut log = self.shared.log.lock();
            log.finalize_last();
            if let Err(e) = log.append(Message::error_notice(self.conversation.clone(), &message)) {
                error!(error = %e, "failed to append stream error notice");
            }
        }
        self.finish(SessionStatus::Failed(message))
    }

    fn finish(self, status: SessionStatus) -> SessionStatus {
        if self.shared.registry.is_current(self.generation) {
            *self.shared.state.lock() = ControllerState::Idle;
        }
        // Cancellations are announced by the intent that triggered them
        // (pause / new send / new conversation), not by the dying session.
        if status != SessionStatus::Cancelled {
            self.shared.emit(EngineEvent::StreamEnded {
                generation: self.generation,
                status: status.clone(),
            });
        }
        status
    }
}
