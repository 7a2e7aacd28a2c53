pub mod conversation_controller;
pub mod stream_session;

pub use conversation_controller::{
    ControllerState, ConversationController, EngineEvent, SessionHandle,
};
pub use stream_session::{SessionStatus, StreamSession};
