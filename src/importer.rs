// 📥 CSV Importer - bulk load of pre-vetted entrants
// One transaction per file: either every added row is committed, or none is.

use crate::columns::{split_combined, ColumnLayout, CriteriaColumns, CRITERIA_COUNT};
use crate::db::{self, Event, NewEntry};
use crate::error::{DrawError, Result};
use crate::normalize::{coerce_bool, normalize_handle};
use csv::{ReaderBuilder, StringRecord};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Aggregate outcome of one import. Counts only what was durably committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Import the CSV file at `path` into the entries table
///
/// Rows with an empty handle are skipped. With `skip_existing`, rows whose
/// handle is already stored (or appeared earlier in the same file) are
/// skipped too; without it they still cannot create a second record and are
/// counted as skipped when the unique constraint rejects them.
///
/// # Errors:
/// * `NotFound` - `path` does not exist (checked before touching the store)
/// * `Configuration` - schema not initialized
/// * `Csv` / `Io` - unreadable file; nothing is committed
/// * `Persistence` - insert or commit failed; nothing is committed
pub fn import_csv(conn: &mut Connection, path: &Path, skip_existing: bool) -> Result<ImportSummary> {
    if !path.exists() {
        return Err(DrawError::NotFound {
            path: path.to_path_buf(),
        });
    }

    db::require_schema(conn)?;
    let file = File::open(path)?;

    import_from_reader(conn, file, &path.display().to_string(), skip_existing)
}

/// Same as `import_csv`, reading from any source (uploads, tests)
pub fn import_from_reader<R: Read>(
    conn: &mut Connection,
    reader: R,
    source: &str,
    skip_existing: bool,
) -> Result<ImportSummary> {
    db::require_schema(conn)?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let layout = ColumnLayout::resolve(&headers);
    debug!(source, ?layout, "resolved csv columns");

    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result?;
        let line = line_num + 2; // 1-indexed + header row

        let raw_handle = layout
            .username
            .as_ref()
            .and_then(|col| record.get(col.index))
            .unwrap_or("");
        let handle = normalize_handle(raw_handle);

        if handle.is_empty() {
            debug!(line, "skipping row without handle");
            summary.skipped += 1;
            continue;
        }

        if skip_existing && db::find_by_handle(&tx, &handle)?.is_some() {
            debug!(line, %handle, "skipping existing handle");
            summary.skipped += 1;
            continue;
        }

        let new = NewEntry {
            criteria: criteria_for(&record, &layout.criteria, line),
            first_name: optional_text(&record, &layout, |l| &l.first_name),
            last_name: optional_text(&record, &layout, |l| &l.last_name),
            in_attendance: layout
                .attendance
                .as_ref()
                .map_or(false, |col| coerce_bool(record.get(col.index))),
            handle,
        };

        match db::insert_entry(&tx, &new) {
            Ok(_) => summary.added += 1,
            Err(e) if db::is_constraint_violation(&e) => {
                debug!(line, handle = %new.handle, "duplicate handle rejected by store");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    db::insert_event(
        &tx,
        &Event::new(
            "entries_imported",
            "import",
            source,
            serde_json::json!({
                "added": summary.added,
                "skipped": summary.skipped,
                "skip_existing": skip_existing,
            }),
            "csv_importer",
        ),
    )?;

    tx.commit()?;

    info!(source, added = summary.added, skipped = summary.skipped, "csv import committed");
    Ok(summary)
}

/// The four criteria booleans for one row; unparseable input is all-false
fn criteria_for(record: &StringRecord, columns: &CriteriaColumns, line: usize) -> [bool; CRITERIA_COUNT] {
    let mut values = [false; CRITERIA_COUNT];

    match columns {
        CriteriaColumns::PerColumn(cols) => {
            for (slot, col) in values.iter_mut().zip(cols.iter()) {
                *slot = col
                    .as_ref()
                    .map_or(false, |c| coerce_bool(record.get(c.index)));
            }
        }
        CriteriaColumns::Combined(col) => {
            let raw = record.get(col.index).unwrap_or("");
            match split_combined(raw, CRITERIA_COUNT) {
                Some(parts) => {
                    for (slot, part) in values.iter_mut().zip(parts.iter()) {
                        *slot = coerce_bool(part.as_str());
                    }
                }
                None => warn!(line, value = raw, "combined criteria value not understood, defaulting to false"),
            }
        }
        CriteriaColumns::Absent => {}
    }

    values
}

fn optional_text<F>(record: &StringRecord, layout: &ColumnLayout, pick: F) -> Option<String>
where
    F: Fn(&ColumnLayout) -> &Option<crate::columns::Column>,
{
    pick(layout)
        .as_ref()
        .and_then(|col| record.get(col.index))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{find_by_handle, list_entries, recent_events, setup_database};
    use std::io::Write;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn import_str(conn: &mut Connection, csv: &str) -> ImportSummary {
        import_from_reader(conn, csv.as_bytes(), "inline.csv", true).unwrap()
    }

    #[test]
    fn test_per_column_import() {
        let mut conn = setup();
        let summary = import_str(&mut conn, "username,c1,c2,c3,c4\n@A,1,1,1,1\nb,1,0,yes,on\n");

        assert_eq!(summary, ImportSummary { added: 2, skipped: 0 });
        let a = find_by_handle(&conn, "a").unwrap().unwrap();
        let b = find_by_handle(&conn, "b").unwrap().unwrap();
        assert_eq!(a.criteria, [true; 4]);
        assert_eq!(b.criteria, [true, false, true, true]);
    }

    #[test]
    fn test_combined_column_import() {
        let mut conn = setup();
        let summary = import_str(
            &mut conn,
            "handle,c1c2c3c4\nx,\"1,0,1,0\"\ny,1111\nz,garbage\n",
        );

        assert_eq!(summary.added, 3);
        assert_eq!(find_by_handle(&conn, "x").unwrap().unwrap().criteria, [true, false, true, false]);
        assert_eq!(find_by_handle(&conn, "y").unwrap().unwrap().criteria, [true; 4]);
        assert_eq!(find_by_handle(&conn, "z").unwrap().unwrap().criteria, [false; 4]);
    }

    #[test]
    fn test_no_criteria_columns_defaults_false() {
        let mut conn = setup();
        import_str(&mut conn, "instagram_handle,email\nsomeone,a@b.c\n");
        let e = find_by_handle(&conn, "someone").unwrap().unwrap();
        assert_eq!(e.criteria, [false; 4]);
        assert!(!e.in_attendance);
    }

    #[test]
    fn test_missing_per_column_index_defaults_false() {
        let mut conn = setup();
        import_str(&mut conn, "username,c1,c3\nq,1,1\n");
        let e = find_by_handle(&conn, "q").unwrap().unwrap();
        assert_eq!(e.criteria, [true, false, true, false]);
    }

    #[test]
    fn test_empty_handles_skipped() {
        let mut conn = setup();
        let summary = import_str(&mut conn, "username,c1\n,1\n  @ ,1\nreal,1\n");
        assert_eq!(summary, ImportSummary { added: 1, skipped: 2 });
    }

    #[test]
    fn test_duplicates_within_file_skipped() {
        let mut conn = setup();
        let summary = import_str(&mut conn, "username\nSam\n@sam\ns a m\n");
        assert_eq!(summary, ImportSummary { added: 1, skipped: 2 });
    }

    #[test]
    fn test_duplicates_without_skip_existing_never_duplicate() {
        let mut conn = setup();
        import_str(&mut conn, "username\nsam\n");
        let summary = import_from_reader(&mut conn, "username\nsam\nnew\n".as_bytes(), "again.csv", false).unwrap();
        assert_eq!(summary, ImportSummary { added: 1, skipped: 1 });
        assert_eq!(list_entries(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_first_column_fallback_and_names() {
        let mut conn = setup();
        import_str(&mut conn, "ig,fname,lname,attended\n@Jo,Jo,Doe,yes\n");
        let e = find_by_handle(&conn, "jo").unwrap().unwrap();
        assert_eq!(e.first_name.as_deref(), Some("Jo"));
        assert_eq!(e.last_name.as_deref(), Some("Doe"));
        assert!(e.in_attendance);
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let mut conn = setup();
        let summary = import_str(&mut conn, "username,c1,c2,c3,c4\nshort,1\n");
        assert_eq!(summary.added, 1);
        assert_eq!(find_by_handle(&conn, "short").unwrap().unwrap().criteria, [true, false, false, false]);
    }

    #[test]
    fn test_import_records_audit_event() {
        let mut conn = setup();
        import_str(&mut conn, "username\na\nb\n");
        let events = recent_events(&conn, 5).unwrap();
        assert_eq!(events[0].event_type, "entries_imported");
        assert_eq!(events[0].data["added"], 2);
    }

    #[test]
    fn test_import_file_twice() {
        let mut conn = setup();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "username,c1,c2,c3,c4").unwrap();
        writeln!(file, "one,1,1,1,1").unwrap();
        writeln!(file, "two,0,0,0,0").unwrap();
        writeln!(file, "three,1,0,1,0").unwrap();
        file.flush().unwrap();

        let first = import_csv(&mut conn, file.path(), true).unwrap();
        let second = import_csv(&mut conn, file.path(), true).unwrap();

        assert_eq!(first, ImportSummary { added: 3, skipped: 0 });
        assert_eq!(second, ImportSummary { added: 0, skipped: 3 });
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut conn = setup();
        let result = import_csv(&mut conn, Path::new("/definitely/not/here.csv"), true);
        assert!(matches!(result, Err(DrawError::NotFound { .. })));
    }

    #[test]
    fn test_uninitialized_store_is_configuration_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let result = import_from_reader(&mut conn, "username\na\n".as_bytes(), "x.csv", true);
        assert!(matches!(result, Err(DrawError::Configuration(_))));
    }

    #[test]
    fn test_failed_import_commits_nothing() {
        let mut conn = setup();
        // Invalid UTF-8 on the third data row aborts the whole file
        let mut bytes = b"username\nok1\nok2\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);

        let result = import_from_reader(&mut conn, bytes.as_slice(), "bad.csv", true);
        assert!(matches!(result, Err(DrawError::Csv(_))));
        assert!(list_entries(&conn).unwrap().is_empty());
    }
}
