//! Anthropic Messages API adapter.
//!
//! Streams `content_block_delta` text into the caller's delta channel and
//! returns the accumulated text. The engine's tool-call contract is
//! textual, so no native tool registration happens here; tool specs travel
//! in the system preamble the engine builds.

use serde_json::Value;
use tokio::sync::mpsc;

use bc_domain::error::{Error, Result};
use bc_domain::message::{Message, Role};

use crate::sse::drain_data_lines;
use crate::traits::{Completion, CompletionRequest, DeltaChunk, ModelTransport};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Streaming transport against the Anthropic Messages API.
pub struct AnthropicTransport {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn build_body(model_id: &str, messages: &[Message]) -> Value {
        // System messages go in the top-level `system` field; tool-role
        // messages become user turns (the wire has no plain-text tool
        // role).
        let mut system_parts: Vec<&str> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User | Role::Tool => {
                    api_messages.push(serde_json::json!({
                        "role": "user",
                        "content": msg.content,
                    }));
                }
                Role::Assistant => {
                    api_messages.push(serde_json::json!({
                        "role": "assistant",
                        "content": msg.content,
                    }));
                }
            }
        }

        let mut body = serde_json::json!({
            "model": model_id,
            "messages": api_messages,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "stream": true,
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        body
    }

    async fn stream_completion(
        &self,
        body: Value,
        on_delta: Option<mpsc::UnboundedSender<DeltaChunk>>,
    ) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("model API {status}: {detail}")));
        }

        let mut response = response;
        let mut buffer = String::new();
        let mut text = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        handle_stream_event(&data, &mut text, &on_delta)?;
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(Error::Http(e.to_string())),
            }
        }

        Ok(text)
    }
}

/// Parse one SSE `data:` payload and fold it into the accumulated text.
fn handle_stream_event(
    data: &str,
    text: &mut String,
    on_delta: &Option<mpsc::UnboundedSender<DeltaChunk>>,
) -> Result<()> {
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        tracing::debug!(payload = %data, "skipping unparseable stream event");
        return Ok(());
    };

    match event.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => {
            if let Some(fragment) = event
                .pointer("/delta/text")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
            {
                text.push_str(fragment);
                if let Some(tx) = on_delta {
                    let _ = tx.send(DeltaChunk {
                        text: fragment.to_owned(),
                        done: false,
                    });
                }
            }
        }
        Some("message_stop") => {
            if let Some(tx) = on_delta {
                let _ = tx.send(DeltaChunk {
                    text: String::new(),
                    done: true,
                });
            }
        }
        Some("error") => {
            let message = event
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error");
            return Err(Error::Http(format!("model stream error: {message}")));
        }
        _ => {}
    }
    Ok(())
}

#[async_trait::async_trait]
impl ModelTransport for AnthropicTransport {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion> {
        let body = Self::build_body(&req.model_id, &req.messages);
        let cancel = req.cancel.clone();
        let timeout_ms = req.timeout_ms;

        let fut = self.stream_completion(body, req.on_delta);
        let guarded = async {
            match timeout_ms {
                Some(ms) => tokio::time::timeout(std::time::Duration::from_millis(ms), fut)
                    .await
                    .map_err(|_| Error::ModelTimeout(ms))?,
                None => fut.await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = guarded => result.map(|text| Completion { text }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_splits_system_and_maps_tool_to_user() {
        let messages = vec![
            Message::system("preamble"),
            Message::user("hi"),
            Message::assistant("{\"type\":\"tool_call\"}"),
            Message::tool("{\"tool\":\"exec\",\"ok\":true}"),
        ];
        let body = AnthropicTransport::build_body("claude-x", &messages);

        assert_eq!(body["system"], "preamble");
        assert_eq!(body["model"], "claude-x");
        assert_eq!(body["stream"], true);
        let api_messages = body["messages"].as_array().unwrap();
        assert_eq!(api_messages.len(), 3);
        assert_eq!(api_messages[0]["role"], "user");
        assert_eq!(api_messages[1]["role"], "assistant");
        assert_eq!(api_messages[2]["role"], "user");
    }

    #[test]
    fn stream_event_accumulates_and_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut text = String::new();
        let on_delta = Some(tx);

        handle_stream_event(
            r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hel"}}"#,
            &mut text,
            &on_delta,
        )
        .unwrap();
        handle_stream_event(
            r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"lo"}}"#,
            &mut text,
            &on_delta,
        )
        .unwrap();
        handle_stream_event(r#"{"type":"message_stop"}"#, &mut text, &on_delta).unwrap();

        assert_eq!(text, "hello");
        assert_eq!(rx.try_recv().unwrap().text, "hel");
        assert_eq!(rx.try_recv().unwrap().text, "lo");
        let last = rx.try_recv().unwrap();
        assert!(last.done);
        assert!(last.text.is_empty());
    }

    #[test]
    fn stream_error_event_fails() {
        let mut text = String::new();
        let err = handle_stream_event(
            r#"{"type":"error","error":{"message":"overloaded"}}"#,
            &mut text,
            &None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut text = String::new();
        handle_stream_event(r#"{"type":"ping"}"#, &mut text, &None).unwrap();
        handle_stream_event("not json", &mut text, &None).unwrap();
        assert!(text.is_empty());
    }
}
