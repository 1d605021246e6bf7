//! SQLite interaction ledger
//!
//! Append-only log of approved LLM interactions. Quota checks and session
//! summaries both read from here; nothing ever updates or deletes a row.

use crate::types::InteractionRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ai_interactions (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    session_id    TEXT NOT NULL,
    stage         TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    input_tokens  INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd      REAL NOT NULL DEFAULT 0.0
);

CREATE INDEX IF NOT EXISTS idx_interactions_session
    ON ai_interactions(session_id);

CREATE INDEX IF NOT EXISTS idx_interactions_session_stage
    ON ai_interactions(session_id, stage);
"#;

/// Open (creating if needed) the ledger database at the given path.
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("opening database {}", path.as_ref().display()))?;
    conn.execute_batch(SCHEMA).context("applying schema")?;
    Ok(conn)
}

/// In-memory ledger, for tests and ephemeral runs.
pub fn init_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA).context("applying schema")?;
    Ok(conn)
}

/// Append one interaction record.
pub fn insert_interaction(conn: &Connection, record: &InteractionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO ai_interactions
             (id, user_id, session_id, stage, created_at, input_tokens, output_tokens, cost_usd)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            record.user_id,
            record.session_id,
            record.stage,
            record.created_at.to_rfc3339(),
            record.input_tokens,
            record.output_tokens,
            record.cost_usd,
        ],
    )
    .context("inserting interaction record")?;
    Ok(())
}

/// Interaction counts per stage for one session.
pub fn stage_counts(conn: &Connection, session_id: &str) -> Result<HashMap<String, u32>> {
    let mut stmt = conn.prepare(
        "SELECT stage, COUNT(*) FROM ai_interactions
         WHERE session_id = ?1 GROUP BY stage",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (stage, count) = row?;
        counts.insert(stage, count);
    }
    Ok(counts)
}

/// Total interaction count for one session.
pub fn session_count(conn: &Connection, session_id: &str) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM ai_interactions WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// All records for one session, oldest first. Feeds the summary's
/// interaction analysis.
pub fn session_log(conn: &Connection, session_id: &str) -> Result<Vec<InteractionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, session_id, stage, created_at, input_tokens, output_tokens, cost_usd
         FROM ai_interactions WHERE session_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        let created_at: String = row.get(4)?;
        Ok(InteractionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            stage: row.get(3)?,
            created_at: created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            input_tokens: row.get(5)?,
            output_tokens: row.get(6)?,
            cost_usd: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
