pub mod completion;
pub mod http_completion;
pub mod scripted_completion;

pub use completion::{CompletionClient, CompletionError, EventStream, StreamEvent};
pub use http_completion::HttpCompletionClient;
pub use scripted_completion::ScriptedCompletionClient;
