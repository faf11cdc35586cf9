//! Durable session event store with per-session live fan-out.
//!
//! One SQLite database holds all sessions and their append-only event logs.
//! Appending is the sole mutation path; events are never edited or deleted.

mod events;
mod store;

pub use events::{EventKind, EventRecord, SessionSummary};
pub use store::SessionStore;
