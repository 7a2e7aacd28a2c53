pub mod cancellation;
pub mod list_cache;
pub mod message;
pub mod message_log;

pub use cancellation::{CancelHandle, CancellationRegistry};
pub use list_cache::ConversationListCache;
pub use message::{ConversationId, Message, PROVISIONAL_ID_PREFIX, Role};
pub use message_log::MessageLog;
