//! Client for external tool servers spoken to over stdio-framed JSON-RPC.
//!
//! Each configured server is a child process. Startup performs the
//! `initialize` / `notifications/initialized` / `tools/list` handshake;
//! afterwards tools are invoked with `tools/call`.

mod manager;
mod protocol;
mod transport;

pub use manager::{McpError, McpManager, McpServer};
pub use protocol::{McpToolDef, ToolAnnotations, ToolCallResult};
pub use transport::{StdioTransport, TransportError};
