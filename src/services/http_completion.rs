use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::models::{CancelHandle, ConversationId};

use super::completion::{CompletionClient, CompletionError, EventStream, StreamEvent};

/// Wire shape of one server-sent event payload.
///
/// An increment may carry the server-assigned conversation id on the first
/// exchange of a brand-new conversation; the adapter splits that into a
/// separate `BoundIdentity` event so downstream code never re-inspects it.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Increment {
        text: String,
        #[serde(default)]
        conversation_id: Option<String>,
    },
    Done,
    Error {
        message: String,
    },
}

/// Decode one SSE line into a wire event. Blank lines and comment lines are
/// skipped; a malformed payload is a protocol error.
fn decode_line(line: &str) -> Result<Option<WireEvent>, CompletionError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let payload = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
    if payload == "[DONE]" {
        return Ok(Some(WireEvent::Done));
    }
    serde_json::from_str::<WireEvent>(payload)
        .map(Some)
        .map_err(|e| CompletionError::Protocol(format!("bad event payload: {e}")))
}

/// Streaming completion client over the application's SSE endpoint.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: &EngineConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

impl CompletionClient for HttpCompletionClient {
    fn open(
        &self,
        conversation: ConversationId,
        content: String,
        cancel: CancelHandle,
    ) -> BoxFuture<'static, Result<EventStream, CompletionError>> {
        let mut request = self.http.post(format!("{}/chat/stream", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body = serde_json::json!({
            "content": content,
            "conversation_id": conversation.as_bound(),
        });

        Box::pin(async move {
            let response = request
                .json(&body)
                .send()
                .await
                .map_err(|e| CompletionError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(CompletionError::Transport(format!(
                    "completion endpoint returned {status}"
                )));
            }

            let mut body_stream = response.bytes_stream();
            let events = async_stream::stream! {
                let mut buf: Vec<u8> = Vec::new();
                while let Some(chunk) = body_stream.next().await {
                    if cancel.is_triggered() {
                        debug!("completion stream cancelled, dropping remaining body");
                        return;
                    }
                    let chunk = match chunk {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            yield Err(CompletionError::Transport(e.to_string()));
                            return;
                        }
                    };
                    buf.extend_from_slice(&chunk);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        match decode_line(&line) {
                            Ok(None) => {}
                            Ok(Some(WireEvent::Increment { text, conversation_id })) => {
                                if let Some(id) = conversation_id {
                                    yield Ok(StreamEvent::BoundIdentity(id));
                                }
                                yield Ok(StreamEvent::Increment(text));
                            }
                            Ok(Some(WireEvent::Done)) => {
                                yield Ok(StreamEvent::Done);
                                return;
                            }
                            Ok(Some(WireEvent::Error { message })) => {
                                yield Ok(StreamEvent::Error(message));
                                return;
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
            };

            Ok(Box::pin(events) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_increment_with_identity() {
        let event = decode_line(r#"data: {"type":"increment","text":"Hi","conversation_id":"c-42"}"#)
            .unwrap()
            .unwrap();
        match event {
            WireEvent::Increment {
                text,
                conversation_id,
            } => {
                assert_eq!(text, "Hi");
                assert_eq!(conversation_id.as_deref(), Some("c-42"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_line_skips_blank_and_comment_lines() {
        assert!(decode_line("").unwrap().is_none());
        assert!(decode_line(": keep-alive").unwrap().is_none());
    }

    #[test]
    fn test_decode_line_done_marker() {
        assert!(matches!(
            decode_line("data: [DONE]").unwrap(),
            Some(WireEvent::Done)
        ));
        assert!(matches!(
            decode_line(r#"data: {"type":"done"}"#).unwrap(),
            Some(WireEvent::Done)
        ));
    }

    #[test]
    fn test_decode_line_malformed_payload_is_protocol_error() {
        let err = decode_line("data: {not json}").unwrap_err();
        assert!(matches!(err, CompletionError::Protocol(_)));
    }
}
