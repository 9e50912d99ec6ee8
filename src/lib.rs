// Contest Draw - Core Library
// Entry ingestion, eligibility and random winner selection over one SQLite store.
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod normalize;
pub mod columns;
pub mod eligibility;
pub mod db;
pub mod importer;
pub mod registration;
pub mod draw;
pub mod export;
pub mod config;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{DrawError, Result};
pub use normalize::{coerce_bool, normalize_handle, Truthy};
pub use columns::{split_combined, ColumnLayout, CriteriaColumns, CRITERIA_COUNT};
pub use eligibility::{EligibilityPolicy, UnknownPolicy};
pub use db::{
    Entry, NewEntry, Event,
    open_database, setup_database, require_schema,
    find_by_handle, find_eligible, list_entries, list_winners, count_entries,
    insert_event, get_events_for_entity, recent_events,
};
pub use importer::{import_csv, import_from_reader, ImportSummary};
pub use registration::{check_in, clear_entries, register_entry, update_criteria, Registration};
pub use draw::{draw, reset_selection, sample_winners, DrawOutcome, DrawRng};
pub use export::export_csv;
pub use config::{AppConfig, ConfigError, DrawConfig, DEFAULT_MAX_WINNERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
