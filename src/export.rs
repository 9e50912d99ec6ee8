// 📤 Export - every entry as CSV, for audit
use crate::db;
use crate::error::Result;
use rusqlite::Connection;
use std::io::Write;

const EXPORT_HEADER: [&str; 11] = [
    "id",
    "first_name",
    "last_name",
    "handle",
    "entered_at",
    "c1",
    "c2",
    "c3",
    "c4",
    "in_attendance",
    "is_selected",
];

/// Write all entries (id order) to `writer`. Returns the number of rows written.
pub fn export_csv<W: Write>(conn: &Connection, writer: W) -> Result<usize> {
    let entries = db::list_entries_by_id(conn)?;
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(EXPORT_HEADER)?;
    for e in &entries {
        let [c1, c2, c3, c4] = e.criteria;
        wtr.write_record([
            e.id.to_string(),
            e.first_name.clone().unwrap_or_default(),
            e.last_name.clone().unwrap_or_default(),
            e.handle.clone(),
            e.entered_at.to_rfc3339(),
            c1.to_string(),
            c2.to_string(),
            c3.to_string(),
            c4.to_string(),
            e.in_attendance.to_string(),
            e.is_selected.to_string(),
        ])?;
    }
    wtr.flush()?;

    Ok(entries.len())
}
