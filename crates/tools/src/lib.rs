//! Built-in tools and the uniform tool runtime.
//!
//! Five built-ins run in-process (`read_file`, `write_file`, `list_files`,
//! `grep`, `exec`); external tool servers surface under composite
//! `mcp.<server>.<tool>` names. The [`ToolRuntime`] dispatches both behind
//! one interface.

mod exec;
mod files;
mod path;
mod runtime;
mod search;

pub use path::resolve_within;
pub use runtime::ToolRuntime;
