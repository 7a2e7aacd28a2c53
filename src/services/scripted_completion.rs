use std::collections::VecDeque;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::{CancelHandle, ConversationId};

use super::completion::{CompletionClient, CompletionError, EventStream, StreamEvent};

type ScriptItem = Result<StreamEvent, CompletionError>;

enum ScriptSource {
    Events(Vec<ScriptItem>),
    Channel(mpsc::UnboundedReceiver<ScriptItem>),
}

/// In-memory completion client driven by pre-scripted event sequences or
/// live channels. Useful for testing and development.
///
/// Each `open` call consumes the next queued source in FIFO order.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    sources: Mutex<VecDeque<ScriptSource>>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fixed event sequence for the next `open` call.
    pub fn push_events(&self, events: Vec<ScriptItem>) {
        self.sources.lock().push_back(ScriptSource::Events(events));
    }

    /// Queue a channel-fed stream for the next `open` call. The returned
    /// sender drives it one event at a time; dropping the sender ends the
    /// stream without a `Done`, i.e. as a mid-reply transport drop.
    pub fn push_channel(&self) -> mpsc::UnboundedSender<ScriptItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sources.lock().push_back(ScriptSource::Channel(rx));
        tx
    }
}

impl CompletionClient for ScriptedCompletionClient {
    fn open(
        &self,
        _conversation: ConversationId,
        _content: String,
        cancel: CancelHandle,
    ) -> BoxFuture<'static, Result<EventStream, CompletionError>> {
        let source = self.sources.lock().pop_front();
        Box::pin(async move {
            let Some(source) = source else {
                return Err(CompletionError::Transport(
                    "no scripted response queued".to_string(),
                ));
            };
            let events = match source {
                ScriptSource::Events(items) => {
                    let stream = async_stream::stream! {
                        for item in items {
                            // Yield between events so cancellation and
                            // supersede interleave the way a network stream
                            // would.
                            tokio::task::yield_now().await;
                            if cancel.is_triggered() {
                                return;
                            }
                            yield item;
                        }
                    };
                    Box::pin(stream) as EventStream
                }
                ScriptSource::Channel(mut rx) => {
                    let stream = async_stream::stream! {
                        while let Some(item) = rx.recv().await {
                            if cancel.is_triggered() {
                                return;
                            }
                            yield item;
                        }
                    };
                    Box::pin(stream) as EventStream
                }
            };
            Ok(events)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripted_events_replay_in_order() {
        let client = ScriptedCompletionClient::new();
        client.push_events(vec![
            Ok(StreamEvent::Increment("a".to_string())),
            Ok(StreamEvent::Done),
        ]);

        let mut stream = client
            .open(
                ConversationId::Unbound,
                "hi".to_string(),
                CancelHandle::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            stream.next().await,
            Some(Ok(StreamEvent::Increment("a".to_string())))
        );
        assert_eq!(stream.next().await, Some(Ok(StreamEvent::Done)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_open_without_script_is_transport_error() {
        let client = ScriptedCompletionClient::new();
        let err = client
            .open(
                ConversationId::Unbound,
                "hi".to_string(),
                CancelHandle::new(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_triggered_cancel_stops_replay() {
        let client = ScriptedCompletionClient::new();
        client.push_events(vec![Ok(StreamEvent::Increment("a".to_string()))]);

        let cancel = CancelHandle::new();
        cancel.trigger();

        let mut stream = client
            .open(ConversationId::Unbound, "hi".to_string(), cancel)
            .await
            .unwrap();
        assert_eq!(stream.next().await, None);
    }
}
