//! Model transport: the streaming completion capability the step engine
//! depends on, plus the concrete Anthropic adapter and API-key resolution.

mod anthropic;
mod auth;
mod sse;
mod traits;

pub use anthropic::AnthropicTransport;
pub use auth::{resolve_api_key, save_api_key};
pub use traits::{Completion, CompletionRequest, DeltaChunk, ModelTransport};
