//! SQLite-backed session store.
//!
//! Writes are serialized behind an async mutex so that listener
//! notification order always equals append order; reads go straight to the
//! pool. Live listeners are per-session broadcast channels; a slow consumer
//! sees `RecvError::Lagged` rather than silently missing events.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::broadcast;

use bc_domain::error::{Error, Result};

use crate::events::{EventKind, EventRecord, SessionSummary};

/// Broadcast buffer per session. Consumers slower than this many events
/// behind the head are told how much they missed.
const CHANNEL_CAPACITY: usize = 1024;

const MIGRATE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id         TEXT    PRIMARY KEY,
    created_at INTEGER NOT NULL,
    name       TEXT
);

CREATE TABLE IF NOT EXISTS events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT    NOT NULL REFERENCES sessions(id),
    kind       TEXT    NOT NULL,
    payload    TEXT    NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_session_time
    ON events(session_id, created_at);
"#;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Durable session/event store plus the per-session listener registry.
pub struct SessionStore {
    pool: SqlitePool,
    /// Serializes the insert + notify sequence of [`append_event`].
    write_lock: tokio::sync::Mutex<()>,
    channels: parking_lot::Mutex<HashMap<String, broadcast::Sender<EventRecord>>>,
}

impl SessionStore {
    /// Open (or create) the store at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(store_err)?;

        sqlx::query(MIGRATE).execute(&pool).await.map_err(store_err)?;
        migrate_name_column(&pool).await?;

        tracing::info!(path = %db_path.display(), "session store opened");

        Ok(Self {
            pool,
            write_lock: tokio::sync::Mutex::new(()),
            channels: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Create a session with a fresh short id; returns the id.
    pub async fn create_session(&self) -> Result<String> {
        loop {
            let id = short_id();
            let result = sqlx::query("INSERT INTO sessions (id, created_at) VALUES (?, ?)")
                .bind(&id)
                .bind(now_ms())
                .execute(&self.pool)
                .await;
            match result {
                Ok(_) => return Ok(id),
                // Id collision: roll again.
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => continue,
                Err(e) => return Err(store_err(e)),
            }
        }
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<SessionSummary>> {
        let row = sqlx::query(
            "SELECT s.id, s.name, s.created_at, \
                    (SELECT MAX(e.created_at) FROM events e WHERE e.session_id = s.id) AS last_event_at, \
                    (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id) AS event_count \
             FROM sessions s WHERE s.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(summary_from_row).transpose()
    }

    /// List sessions, most recently active first. `limit` is clamped to
    /// `1..=500`.
    pub async fn list_sessions(&self, limit: i64) -> Result<Vec<SessionSummary>> {
        let limit = limit.clamp(1, 500);
        let rows = sqlx::query(
            "SELECT s.id, s.name, s.created_at, \
                    (SELECT MAX(e.created_at) FROM events e WHERE e.session_id = s.id) AS last_event_at, \
                    (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id) AS event_count \
             FROM sessions s \
             ORDER BY COALESCE(last_event_at, s.created_at) DESC, s.id DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(summary_from_row).collect()
    }

    /// Id of the most recently active session.
    pub async fn get_last_session_id(&self) -> Result<Option<String>> {
        Ok(self.list_sessions(1).await?.into_iter().next().map(|s| s.id))
    }

    /// Rename a session. The name is trimmed; an empty result is a no-op.
    pub async fn update_session_name(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let result = sqlx::query("UPDATE sessions SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Append one event. This is the sole mutation path for the event log.
    /// Listeners are notified after the row is durably written, in append
    /// order.
    pub async fn append_event(
        &self,
        session_id: &str,
        kind: EventKind,
        payload: Value,
    ) -> Result<EventRecord> {
        let _guard = self.write_lock.lock().await;

        let exists = sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("session {session_id}")));
        }

        let created_at = now_ms();
        let payload_text = payload.to_string();
        let result = sqlx::query(
            "INSERT INTO events (session_id, kind, payload, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(kind.as_str())
        .bind(&payload_text)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        let record = EventRecord {
            id: result.last_insert_rowid(),
            session_id: session_id.to_owned(),
            kind,
            payload,
            created_at,
        };

        self.notify(&record);
        Ok(record)
    }

    /// Full event log for a session, ordered by `(created_at, id)`.
    /// Rows whose payload no longer parses as JSON surface as
    /// `{"raw": <original-text>}` instead of failing the listing.
    pub async fn list_events(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            "SELECT id, session_id, kind, payload, created_at \
             FROM events WHERE session_id = ? \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_raw: String = row.try_get("kind").map_err(store_err)?;
            let Some(kind) = EventKind::parse(&kind_raw) else {
                tracing::warn!(kind = %kind_raw, "skipping event row with unknown kind");
                continue;
            };
            let payload_text: String = row.try_get("payload").map_err(store_err)?;
            let payload = serde_json::from_str(&payload_text)
                .unwrap_or_else(|_| serde_json::json!({ "raw": payload_text }));
            events.push(EventRecord {
                id: row.try_get("id").map_err(store_err)?,
                session_id: row.try_get("session_id").map_err(store_err)?,
                kind,
                payload,
                created_at: row.try_get("created_at").map_err(store_err)?,
            });
        }
        Ok(events)
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    /// Subscribe to live events for a session.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<EventRecord> {
        self.sender(session_id).subscribe()
    }

    /// Subscribe and take a snapshot atomically: no event can land between
    /// the snapshot and the first live update, and nothing in the snapshot
    /// is replayed on the live channel.
    pub async fn snapshot_and_subscribe(
        &self,
        session_id: &str,
    ) -> Result<(Vec<EventRecord>, broadcast::Receiver<EventRecord>)> {
        let _guard = self.write_lock.lock().await;
        let receiver = self.sender(session_id).subscribe();
        let snapshot = self.list_events(session_id).await?;
        Ok((snapshot, receiver))
    }

    fn sender(&self, session_id: &str) -> broadcast::Sender<EventRecord> {
        let mut channels = self.channels.lock();
        channels
            .entry(session_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn notify(&self, record: &EventRecord) {
        let sender = {
            let channels = self.channels.lock();
            channels.get(&record.session_id).cloned()
        };
        if let Some(sender) = sender {
            // Err means no live receivers; nothing to deliver.
            let _ = sender.send(record.clone());
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn store_err(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_owned()
}

fn summary_from_row(row: sqlx::sqlite::SqliteRow) -> Result<SessionSummary> {
    Ok(SessionSummary {
        id: row.try_get("id").map_err(store_err)?,
        name: row.try_get("name").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
        last_event_at: row.try_get("last_event_at").map_err(store_err)?,
        event_count: row.try_get("event_count").map_err(store_err)?,
    })
}

/// Legacy stores pre-date the `name` column; add it when missing.
async fn migrate_name_column(pool: &SqlitePool) -> Result<()> {
    let columns = sqlx::query("PRAGMA table_info(sessions)")
        .fetch_all(pool)
        .await
        .map_err(store_err)?;
    let has_name = columns.iter().any(|row| {
        row.try_get::<String, _>("name")
            .map(|n| n == "name")
            .unwrap_or(false)
    });
    if !has_name {
        sqlx::query("ALTER TABLE sessions ADD COLUMN name TEXT")
            .execute(pool)
            .await
            .map_err(store_err)?;
        tracing::info!("added sessions.name column to legacy store");
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
