use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{
    CancelHandle, CancellationRegistry, ConversationId, ConversationListCache, Message, MessageLog,
};
use crate::repositories::{ConversationStore, ConversationSummary};
use crate::services::completion::CompletionClient;

use super::stream_session::{SessionStatus, StreamSession};

/// Controller-visible lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Streaming,
    /// Streaming variant entered via edit-and-regenerate (history was
    /// truncated first).
    EditingRegenerate,
}

impl ControllerState {
    pub fn is_streaming(self) -> bool {
        !matches!(self, ControllerState::Idle)
    }
}

/// Events emitted for decoupled UI updates. Log snapshots stay the source of
/// truth; these only tell the UI when to look again.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    StreamStarted { generation: u64 },
    StreamEnded { generation: u64, status: SessionStatus },
    ConversationBound { conversation_id: String },
    ListRefreshed { count: usize },
}

/// State shared between the controller and its stream sessions.
pub(crate) struct EngineShared {
    pub(crate) log: Mutex<MessageLog>,
    pub(crate) registry: CancellationRegistry,
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) active: Mutex<ConversationId>,
    pub(crate) list_cache: ConversationListCache,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) events: broadcast::Sender<EngineEvent>,
}

impl EngineShared {
    pub(crate) fn emit(&self, event: EngineEvent) {
        // Nobody subscribed is fine.
        let _ = self.events.send(event);
    }
}

/// Handle on one started exchange.
#[derive(Debug)]
pub struct SessionHandle {
    generation: u64,
    join: JoinHandle<SessionStatus>,
}

impl SessionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the session's terminal status. A session torn down after
    /// being superseded resolves as `Cancelled`.
    pub async fn outcome(self) -> SessionStatus {
        match self.join.await {
            Ok(status) => status,
            Err(_) => SessionStatus::Cancelled,
        }
    }
}

/// Orchestrator for the UI intents: send, edit-and-regenerate, pause,
/// select-conversation, new-conversation, plus the store-facing delete,
/// rename, and list refresh.
///
/// At most one stream session is current at any time. Starting a new one
/// supersedes the previous one, and writes from superseded sessions are
/// dropped by generation comparison rather than assumed impossible.
pub struct ConversationController {
    shared: Arc<EngineShared>,
    completion: Arc<dyn CompletionClient>,
    current_task: Mutex<Option<AbortHandle>>,
}

impl ConversationController {
    pub fn new(completion: Arc<dyn CompletionClient>, store: Arc<dyn ConversationStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(EngineShared {
                log: Mutex::new(MessageLog::new()),
                registry: CancellationRegistry::new(),
                state: Mutex::new(ControllerState::Idle),
                active: Mutex::new(ConversationId::Unbound),
                list_cache: ConversationListCache::new(),
                store,
                events,
            }),
            completion,
            current_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.shared.state.lock()
    }

    /// Snapshot of the displayed message log.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.log.lock().snapshot()
    }

    pub fn active_conversation(&self) -> ConversationId {
        self.shared.active.lock().clone()
    }

    /// Snapshot of the cached conversation list.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.shared.list_cache.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Send a user message on the active conversation and start streaming
    /// the reply. Any in-flight session is superseded first.
    pub fn send(&self, content: &str) -> Result<SessionHandle, EngineError> {
        let conversation = self.active_conversation();
        debug!(conversation = %conversation, "send");
        let (cancel, generation) = self.supersede();
        {
            let mut log = self.shared.log.lock();
            log.retire_unfinalized_tail();
            log.append_pair(
                Message::user(conversation.clone(), content),
                Message::placeholder(conversation.clone()),
            )?;
        }
        Ok(self.start_session(
            conversation,
            content.to_string(),
            generation,
            cancel,
            ControllerState::Streaming,
        ))
    }

    /// Replace the content of `message_id`, drop everything after it, and
    /// stream a fresh reply. The edited message itself is kept.
    pub fn edit_and_regenerate(
        &self,
        message_id: &str,
        new_text: &str,
    ) -> Result<SessionHandle, EngineError> {
        // Validate before superseding so an edit against a bogus id does not
        // kill an in-flight reply.
        if !self.shared.log.lock().contains(message_id) {
            return Err(EngineError::NotFound(message_id.to_string()));
        }
        let conversation = self.active_conversation();
        debug!(conversation = %conversation, message_id = %message_id, "edit and regenerate");
        let (cancel, generation) = self.supersede();
        {
            let mut log = self.shared.log.lock();
            log.retire_unfinalized_tail();
            log.truncate_after(message_id)?;
            log.update_content(message_id, new_text)?;
            log.append(Message::placeholder(conversation.clone()))?;
        }
        Ok(self.start_session(
            conversation,
            new_text.to_string(),
            generation,
            cancel,
            ControllerState::EditingRegenerate,
        ))
    }

    /// Stop the in-flight stream, if any. Text already streamed stays in the
    /// log as a frozen snapshot; the message is not re-marked finalized.
    pub fn pause(&self) {
        let was_streaming = self.state().is_streaming();
        let generation = self.shared.registry.current_generation();
        self.shared.registry.cancel_current();
        self.teardown_task();
        *self.shared.state.lock() = ControllerState::Idle;
        if was_streaming {
            info!(generation, "stream paused");
            self.shared.emit(EngineEvent::StreamEnded {
                generation,
                status: SessionStatus::Cancelled,
            });
        }
    }

    /// Switch the displayed conversation and load its history.
    ///
    /// Reentrancy guard: while a stream is active the selection is ignored —
    /// passive navigation must not clobber an in-flight reply; only `pause`
    /// or a new `send` may stop it.
    pub async fn select_conversation(&self, id: &str) -> Result<(), EngineError> {
        if self.state().is_streaming() {
            debug!(conversation_id = %id, "selection ignored while a stream is active");
            return Ok(());
        }
        let token = self.shared.registry.current_generation();
        let history = self.shared.store.get_history(id).await?;
        if !self.shared.registry.is_current(token) {
            debug!(conversation_id = %id, "discarding history load superseded by a newer intent");
            return Ok(());
        }
        self.shared.log.lock().replace_all(history);
        *self.shared.active.lock() = ConversationId::bound(id);
        Ok(())
    }

    /// Start over: cancel any active session, clear the log, unbind the
    /// conversation identity.
    pub fn new_conversation(&self) {
        let was_streaming = self.state().is_streaming();
        let generation = self.shared.registry.current_generation();
        self.shared.registry.cancel_current();
        self.teardown_task();
        self.shared.log.lock().clear();
        *self.shared.active.lock() = ConversationId::Unbound;
        *self.shared.state.lock() = ControllerState::Idle;
        if was_streaming {
            self.shared.emit(EngineEvent::StreamEnded {
                generation,
                status: SessionStatus::Cancelled,
            });
        }
    }

    /// Refresh the conversation list cache from the store.
    pub async fn refresh_conversations(&self) -> Result<usize, EngineError> {
        let count = self
            .shared
            .list_cache
            .refresh(self.shared.store.as_ref())
            .await?;
        self.shared.emit(EngineEvent::ListRefreshed { count });
        Ok(count)
    }

    /// Delete a conversation. If it is currently displayed, the log is
    /// cleared and the identity unbound.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), EngineError> {
        self.shared.store.delete(id).await?;
        self.shared.list_cache.remove(id);
        let is_active =
            matches!(&*self.shared.active.lock(), ConversationId::Bound(active) if active == id);
        if is_active {
            self.new_conversation();
        }
        Ok(())
    }

    /// Rename a conversation remotely and in the cached list.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), EngineError> {
        self.shared.store.rename(id, title).await?;
        self.shared.list_cache.rename(id, title);
        Ok(())
    }

    fn supersede(&self) -> (CancelHandle, u64) {
        let pair = self.shared.registry.supersede();
        self.teardown_task();
        pair
    }

    /// Abort the previous session task. The cancel flag is the real stop
    /// signal; aborting reclaims a task whose transport never yields again.
    fn teardown_task(&self) {
        if let Some(task) = self.current_task.lock().take() {
            task.abort();
        }
    }

    fn start_session(
        &self,
        conversation: ConversationId,
        content: String,
        generation: u64,
        cancel: CancelHandle,
        state: ControllerState,
    ) -> SessionHandle {
        *self.shared.state.lock() = state;
        self.shared.emit(EngineEvent::StreamStarted { generation });
        let session = StreamSession::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.completion),
            conversation,
            content,
            generation,
            cancel,
        );
        let join = tokio::spawn(session.run());
        *self.current_task.lock() = Some(join.abort_handle());
        SessionHandle { generation, join }
    }
}
