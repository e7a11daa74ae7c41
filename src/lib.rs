//! orkl-loader - Load an ORKL threat-intelligence library into SQLite
//!
//! The ORKL library export (`library.json`) is one large JSON array of
//! report entries. Each entry nests the sources that published it, the
//! references it cites, alternative report names, and the threat actors it
//! covers (with their aliases). This crate validates the export against its
//! JSON schema and writes it into a fixed relational schema.
//!
//! # Pipeline
//!
//! 1. **Read** `library.json`. An empty document is a successful no-op.
//! 2. **Validate** the whole document against `library.schema.json`. Nothing
//!    is written unless every entry conforms.
//! 3. **Load** entries in document order over one database session, each in
//!    its own transaction. A failing entry is rolled back, logged, counted as
//!    skipped, and the run continues.
//!
//! # Quick Start
//!
//! ```no_run
//! use orkl_loader::{LoadConfig, LoadOutcome};
//!
//! let config = LoadConfig::default();
//! match orkl_loader::run(&config, |_| {}) {
//!     Ok(LoadOutcome::Completed(summary)) => {
//!         println!("{} processed, {} skipped", summary.processed, summary.skipped_count());
//!     }
//!     Ok(LoadOutcome::Empty) => println!("No data to insert."),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! # Idempotence
//!
//! | Table | Insert | Re-run |
//! |-------|--------|--------|
//! | entries, sources, threat_actors | insert-or-ignore | unchanged |
//! | entries_sources, entries_threat_actors, threat_actors_aliases | insert-or-ignore | unchanged |
//! | references, report_names | plain insert | rows added again |
//!
//! # Modules
//!
//! - [`timestamp`]: lenient ISO-8601 normalization
//! - [`validate`]: JSON Schema validation of the document
//! - [`library`]: typed entry records and their null/absent defaults
//! - [`mappers`]: per-entity row mapping and insert semantics
//! - [`db`]: the SQLite session and table setup
//! - [`loader`]: entry processor and load driver

pub mod db;
pub mod error;
pub mod library;
pub mod loader;
pub mod mappers;
pub mod schema;
pub mod timestamp;
pub mod validate;

pub use db::{Database, TableCounts};
pub use error::{EntryError, LoadError};
pub use library::LibraryEntry;
pub use loader::{
    load_entries, process_entry, run, LoadConfig, LoadEvent, LoadOutcome, LoadSummary,
    SkippedEntry,
};
pub use timestamp::parse_timestamp;
pub use validate::SchemaValidator;

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is reachable from the crate root.
    // ==========================================================================

    #[test]
    fn test_default_config_uses_fixed_paths() {
        let config = LoadConfig::default();
        assert_eq!(config.library_path.to_str(), Some("library.json"));
        assert_eq!(config.schema_path.to_str(), Some("library.schema.json"));
        assert_eq!(config.database_url, "orkl.db");
    }

    #[test]
    fn test_summary_counts() {
        let summary = LoadSummary {
            processed: 3,
            skipped: vec![SkippedEntry {
                index: 1,
                id: Some("e2".into()),
                error: "boom".into(),
            }],
        };
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.inserted_count(), 2);
    }

    #[test]
    fn test_parse_timestamp_accessible() {
        assert!(parse_timestamp(Some("2024-01-01T00:00:00Z")).is_some());
        assert!(parse_timestamp(None).is_none());
    }
}
