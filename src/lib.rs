//! chatline — client-side streaming conversation engine.
//!
//! Keeps a conversational message log consistent while an assistant reply
//! streams in from a remote completion service, and while the user can
//! interrupt, edit, or re-route the exchange at any moment. The UI above
//! this crate only issues intents and renders log snapshots; everything
//! hard lives here: the one-live-stream rule, the first-chunk identity
//! protocol for brand-new conversations, edit-and-regenerate truncation,
//! and generation-based filtering of stale asynchronous writes.

pub mod config;
pub mod controllers;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::{ConfigError, EngineConfig};
pub use controllers::{
    ControllerState, ConversationController, EngineEvent, SessionHandle, SessionStatus,
    StreamSession,
};
pub use error::EngineError;
pub use models::{
    CancelHandle, CancellationRegistry, ConversationId, ConversationListCache, Message, MessageLog,
    Role,
};
pub use repositories::{
    ConversationStore, ConversationSummary, HttpConversationStore, InMemoryConversationStore,
    StoreError,
};
pub use services::{
    CompletionClient, CompletionError, EventStream, HttpCompletionClient, ScriptedCompletionClient,
    StreamEvent,
};
