// 📝 Registration - single entries, check-in and bulk clear
// Same handle rules as the importer; a known handle never makes a second row.

use crate::db::{self, Entry, Event, NewEntry};
use crate::error::{DrawError, Result};
use crate::normalize::normalize_handle;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Registration {
    Created { entry: Entry },
    AlreadyRegistered { handle: String },
}

impl Registration {
    pub fn handle(&self) -> &str {
        match self {
            Registration::Created { entry } => &entry.handle,
            Registration::AlreadyRegistered { handle } => handle,
        }
    }
}

fn clean_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Register one entrant from a raw handle
pub fn register_entry(
    conn: &Connection,
    raw_handle: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<Registration> {
    let handle = normalize_handle(raw_handle);
    if handle.is_empty() {
        return Err(DrawError::InvalidArgument("handle is required".to_string()));
    }

    db::require_schema(conn)?;
    if db::find_by_handle(conn, &handle)?.is_some() {
        return Ok(Registration::AlreadyRegistered { handle });
    }

    let new = NewEntry {
        handle,
        first_name: clean_name(first_name),
        last_name: clean_name(last_name),
        ..NewEntry::default()
    };

    match db::insert_entry(conn, &new) {
        Ok(entry) => {
            info!(handle = %entry.handle, "entry registered");
            Ok(Registration::Created { entry })
        }
        // Lost a race with another registration of the same handle
        Err(e) if db::is_constraint_violation(&e) => Ok(Registration::AlreadyRegistered { handle: new.handle }),
        Err(e) => Err(e),
    }
}

/// Record whether an entrant is present. `raw_handle` is normalized first.
pub fn check_in(conn: &Connection, raw_handle: &str, in_attendance: bool) -> Result<bool> {
    let handle = normalize_handle(raw_handle);
    if handle.is_empty() {
        return Err(DrawError::InvalidArgument("handle is required".to_string()));
    }
    db::set_attendance(conn, &handle, in_attendance)
}

/// Overwrite c1..c4 for one entrant. Returns false when the handle is unknown.
///
/// Leaves `is_selected` alone: a winner stays a winner until the next reset.
pub fn update_criteria(conn: &Connection, raw_handle: &str, criteria: [bool; 4]) -> Result<bool> {
    let handle = normalize_handle(raw_handle);
    if handle.is_empty() {
        return Err(DrawError::InvalidArgument("handle is required".to_string()));
    }
    let updated = db::set_criteria(conn, &handle, criteria)?;
    if updated {
        info!(%handle, ?criteria, "criteria updated");
    }
    Ok(updated)
}

/// Delete every entry (and with it every selection) in one transaction
pub fn clear_entries(conn: &mut Connection) -> Result<usize> {
    db::require_schema(conn)?;
    let tx = conn.transaction()?;

    let deleted = db::delete_all_entries(&tx)?;
    db::insert_event(
        &tx,
        &Event::new(
            "entries_cleared",
            "entries",
            "all",
            serde_json::json!({ "deleted": deleted }),
            "admin",
        ),
    )?;

    tx.commit()?;

    info!(deleted, "all entries deleted");
    Ok(deleted)
}
