//! Validate-then-load pipeline
//!
//! [`run`] reads the document, validates all of it, opens one database
//! session and hands the entries to [`load_entries`]. Each entry is written
//! by [`process_entry`] inside its own transaction: a failure rolls back that
//! entry only and the run continues with the next one.

use crate::db::{Database, DEFAULT_DB_PATH};
use crate::error::{EntryError, LoadError, Result};
use crate::library::LibraryEntry;
use crate::mappers;
use crate::validate::{SchemaValidator, DEFAULT_SCHEMA_PATH};
use diesel::sqlite::SqliteConnection;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Library document used when none is configured
pub const DEFAULT_LIBRARY_PATH: &str = "library.json";

/// Where to read from and write to
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub library_path: PathBuf,
    pub schema_path: PathBuf,
    pub database_url: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            database_url: DEFAULT_DB_PATH.to_string(),
        }
    }
}

/// Progress notifications for the caller
#[derive(Debug)]
pub enum LoadEvent<'a> {
    Validating,
    Validated,
    Inserting { total: usize },
    EntryFinished {
        index: usize,
        result: &'a std::result::Result<(), EntryError>,
    },
}

/// An entry that was rolled back and left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position in the document, starting at 0
    pub index: usize,
    pub id: Option<String>,
    pub error: String,
}

/// Outcome counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub processed: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl LoadSummary {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn inserted_count(&self) -> usize {
        self.processed - self.skipped.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document held no entries; nothing was validated or written
    Empty,
    Completed(LoadSummary),
}

/// Read, validate and load the configured library.
///
/// Nothing is written unless the whole document passes validation. The
/// database session is closed before this returns, on every path.
pub fn run<F>(config: &LoadConfig, mut on_event: F) -> Result<LoadOutcome>
where
    F: FnMut(LoadEvent<'_>),
{
    let document = read_document(&config.library_path)?;
    if is_empty_document(&document) {
        tracing::info!(path = %config.library_path.display(), "no data to insert");
        return Ok(LoadOutcome::Empty);
    }

    on_event(LoadEvent::Validating);
    let validator = SchemaValidator::from_file(&config.schema_path)?;
    validator.validate(&document)?;
    let entries = document.as_array().ok_or_else(|| LoadError::Validation {
        path: String::new(),
        message: "expected a top-level array of entries".to_string(),
    })?;
    tracing::info!(entries = entries.len(), "library document is valid");
    on_event(LoadEvent::Validated);

    let mut db = Database::connect(&config.database_url)?;
    on_event(LoadEvent::Inserting {
        total: entries.len(),
    });
    let summary = load_entries(&mut db, entries, &mut on_event);

    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped_count(),
        "load finished"
    );
    if let Ok(counts) = db.table_counts() {
        tracing::debug!(%counts, "table row counts");
    }

    Ok(LoadOutcome::Completed(summary))
}

/// Load entries in document order, one transaction per entry
pub fn load_entries<F>(db: &mut Database, entries: &[Value], on_event: &mut F) -> LoadSummary
where
    F: FnMut(LoadEvent<'_>),
{
    let mut summary = LoadSummary::default();

    for (index, raw) in entries.iter().enumerate() {
        let result = db.transaction(|conn| process_entry(conn, raw));

        if let Err(ref err) = result {
            let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
            let content = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
            tracing::warn!(
                element = index + 1,
                id = id.as_deref().unwrap_or("<missing>"),
                error = %err,
                entry = %content,
                "skipping entry"
            );
            summary.skipped.push(SkippedEntry {
                index,
                id,
                error: err.to_string(),
            });
        }

        summary.processed += 1;
        on_event(LoadEvent::EntryFinished {
            index,
            result: &result,
        });
    }

    summary
}

/// Write one entry and everything nested under it.
///
/// Order: entry, sources, references, report names, threat actors. The entry
/// row has to exist before anything that points at it.
pub fn process_entry(conn: &mut SqliteConnection, raw: &Value) -> std::result::Result<(), EntryError> {
    let entry = LibraryEntry::from_value(raw)?;

    mappers::insert_entry(conn, &entry)?;

    for source in &entry.sources {
        mappers::insert_source(conn, source, &entry.id)?;
    }

    for reference in &entry.references {
        mappers::insert_reference(conn, reference, &entry.id)?;
    }

    for report_name in &entry.report_names {
        mappers::insert_report_name(conn, report_name, &entry.id)?;
    }

    for actor in &entry.threat_actors {
        mappers::insert_threat_actor(conn, actor, &entry.id)?;
    }

    Ok(())
}

fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Array(entries) => entries.is_empty(),
        _ => false,
    }
}
