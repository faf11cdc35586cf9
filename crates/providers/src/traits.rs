use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bc_domain::error::Result;
use bc_domain::message::Message;
use bc_domain::tool::ToolSpec;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One streamed text fragment. Providers may send incremental chunks or
/// cumulative prefixes; consumers forward them verbatim. The last chunk
/// SHOULD carry `done`.
#[derive(Debug, Clone)]
pub struct DeltaChunk {
    pub text: String,
    pub done: bool,
}

/// A streaming completion request.
pub struct CompletionRequest {
    /// The conversation so far.
    pub messages: Vec<Message>,
    /// Model identifier.
    pub model_id: String,
    /// Tools available this run; adapters whose wire protocol has no
    /// native tool channel may ignore these (the engine also lists them in
    /// its preamble).
    pub tools: Vec<ToolSpec>,
    /// Overall deadline for the completion, milliseconds.
    pub timeout_ms: Option<u64>,
    /// Cooperative cancellation; implementations fail promptly with an
    /// error whose message contains `cancel`.
    pub cancel: CancellationToken,
    /// Streaming side channel. The sender is dropped when the call
    /// returns, closing the stream.
    pub on_delta: Option<mpsc::UnboundedSender<DeltaChunk>>,
}

/// The final completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abstract streaming completion against a remote model provider.
///
/// Contract the engine relies on:
/// - success returns the final assistant text;
/// - `on_delta` fires zero or more times before the call returns;
/// - exceeding `timeout_ms` fails with a message containing `timeout`;
/// - cancellation fails with a message containing `cancel`.
#[async_trait::async_trait]
pub trait ModelTransport: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion>;
}
