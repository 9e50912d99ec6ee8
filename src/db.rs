// 🗄️ Persistence - SQLite (WAL) store for entries and the audit trail
// Every function takes `&Connection`, so callers can run it inside a
// `rusqlite::Transaction` (which derefs to `Connection`) and commit once.

use crate::eligibility::EligibilityPolicy;
use crate::error::{DrawError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// ENTRY
// ============================================================================

/// One contest registrant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,

    /// Normalized, unique, never empty
    pub handle: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,

    pub entered_at: DateTime<Utc>,

    /// c1..c4, read by the criteria policy
    pub criteria: [bool; 4],

    /// Read by the attendance policy
    pub in_attendance: bool,

    /// Set only by a draw, cleared only by a reset
    pub is_selected: bool,
}

impl Entry {
    /// "First Last", falling back to the handle
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();

        if parts.is_empty() {
            self.handle.clone()
        } else {
            parts.join(" ")
        }
    }

    #[cfg(test)]
    pub(crate) fn blank(handle: &str) -> Self {
        Entry {
            id: 0,
            handle: handle.to_string(),
            first_name: None,
            last_name: None,
            entered_at: Utc::now(),
            criteria: [false; 4],
            in_attendance: false,
            is_selected: false,
        }
    }
}

/// Fields supplied at creation; id, timestamp and selection are assigned by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntry {
    pub handle: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub criteria: [bool; 4],
    pub in_attendance: bool,
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Audit trail record ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        DrawError::Configuration(format!("cannot open database {}: {}", path.display(), e))
    })?;

    // A second writer (e.g. a concurrent draw) waits instead of failing at once
    conn.busy_timeout(Duration::from_secs(5))?;
    setup_database(&conn)?;

    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT UNIQUE NOT NULL CHECK (handle <> ''),
            first_name TEXT,
            last_name TEXT,
            entered_at TEXT NOT NULL,
            c1 INTEGER NOT NULL DEFAULT 0,
            c2 INTEGER NOT NULL DEFAULT 0,
            c3 INTEGER NOT NULL DEFAULT 0,
            c4 INTEGER NOT NULL DEFAULT 0,
            in_attendance INTEGER NOT NULL DEFAULT 0,
            is_selected INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_selected ON entries(is_selected)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Fail with `Configuration` unless `setup_database` has run on this connection's file
pub fn require_schema(conn: &Connection) -> Result<()> {
    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('entries', 'events')",
        [],
        |row| row.get(0),
    )?;

    if tables == 2 {
        Ok(())
    } else {
        Err(DrawError::Configuration(
            "database schema is not initialized (entries/events tables missing)".to_string(),
        ))
    }
}

// ============================================================================
// ENTRIES
// ============================================================================

const ENTRY_COLUMNS: &str =
    "id, handle, first_name, last_name, entered_at, c1, c2, c3, c4, in_attendance, is_selected";

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so ORDER BY on the text column is chronological
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row) -> rusqlite::Result<Entry> {
    let entered_at: String = row.get(4)?;

    Ok(Entry {
        id: row.get(0)?,
        handle: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        entered_at: parse_timestamp(4, &entered_at)?,
        criteria: [row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
        in_attendance: row.get(9)?,
        is_selected: row.get(10)?,
    })
}

fn query_entries(conn: &Connection, sql: &str) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map([], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// Insert a new entry. A duplicate handle fails with a constraint violation.
pub fn insert_entry(conn: &Connection, new: &NewEntry) -> Result<Entry> {
    let entered_at = Utc::now();
    let [c1, c2, c3, c4] = new.criteria;

    conn.execute(
        "INSERT INTO entries (handle, first_name, last_name, entered_at, c1, c2, c3, c4, in_attendance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.handle,
            new.first_name,
            new.last_name,
            format_timestamp(&entered_at),
            c1,
            c2,
            c3,
            c4,
            new.in_attendance,
        ],
    )?;

    Ok(Entry {
        id: conn.last_insert_rowid(),
        handle: new.handle.clone(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        entered_at,
        criteria: new.criteria,
        in_attendance: new.in_attendance,
        is_selected: false,
    })
}

/// True when the error is a UNIQUE/CHECK violation rather than a storage failure
pub fn is_constraint_violation(err: &DrawError) -> bool {
    matches!(
        err,
        DrawError::Persistence(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn find_by_handle(conn: &Connection, handle: &str) -> Result<Option<Entry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM entries WHERE handle = ?1", ENTRY_COLUMNS),
            params![handle],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

/// Unselected entries passing `policy`, in id order
pub fn find_eligible(conn: &Connection, policy: EligibilityPolicy) -> Result<Vec<Entry>> {
    query_entries(
        conn,
        &format!(
            "SELECT {} FROM entries WHERE is_selected = 0 AND ({}) ORDER BY id",
            ENTRY_COLUMNS,
            policy.sql_predicate()
        ),
    )
}

/// Newest first
pub fn list_entries(conn: &Connection) -> Result<Vec<Entry>> {
    query_entries(
        conn,
        &format!("SELECT {} FROM entries ORDER BY entered_at DESC, id DESC", ENTRY_COLUMNS),
    )
}

pub fn list_entries_by_id(conn: &Connection) -> Result<Vec<Entry>> {
    query_entries(conn, &format!("SELECT {} FROM entries ORDER BY id", ENTRY_COLUMNS))
}

pub fn list_winners(conn: &Connection) -> Result<Vec<Entry>> {
    query_entries(
        conn,
        &format!("SELECT {} FROM entries WHERE is_selected = 1 ORDER BY id", ENTRY_COLUMNS),
    )
}

pub fn count_entries(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(count)
}

/// Set `is_selected = 1` on each id. Returns the number of rows changed.
pub fn mark_selected(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn.prepare("UPDATE entries SET is_selected = 1 WHERE id = ?1")?;
    let mut changed = 0;
    for id in ids {
        changed += stmt.execute(params![id])?;
    }
    Ok(changed)
}

/// Clear every selection. Returns how many entries were selected before.
pub fn clear_selected(conn: &Connection) -> Result<usize> {
    let changed = conn.execute("UPDATE entries SET is_selected = 0 WHERE is_selected = 1", [])?;
    Ok(changed)
}

pub fn delete_all_entries(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM entries", [])?;
    Ok(deleted)
}

/// Check-in flag for one entry. Returns false when the handle is unknown.
pub fn set_attendance(conn: &Connection, handle: &str, in_attendance: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE entries SET in_attendance = ?1 WHERE handle = ?2",
        params![in_attendance, handle],
    )?;
    Ok(changed > 0)
}

/// Overwrite c1..c4 for one entry. Returns false when the handle is unknown.
pub fn set_criteria(conn: &Connection, handle: &str, criteria: [bool; 4]) -> Result<bool> {
    let [c1, c2, c3, c4] = criteria;
    let changed = conn.execute(
        "UPDATE entries SET c1 = ?1, c2 = ?2, c3 = ?3, c4 = ?4 WHERE handle = ?5",
        params![c1, c2, c3, c4, handle],
    )?;
    Ok(changed > 0)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)
        .map_err(|e| DrawError::InvalidArgument(format!("event data is not serializable: {}", e)))?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    let timestamp: String = row.get(1)?;
    let data_json: String = row.get(5)?;

    Ok(Event {
        event_id: row.get(0)?,
        timestamp: parse_timestamp(1, &timestamp)?,
        event_type: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        data: serde_json::from_str(&data_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        actor: row.get(6)?,
    })
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

/// Latest `limit` events of any kind, newest first
pub fn recent_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let events = stmt
        .query_map(params![limit as i64], event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}
