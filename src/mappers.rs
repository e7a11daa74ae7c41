//! Entity mappers: library records → table rows
//!
//! Every mapper writes through the connection it is handed, so all of them
//! take part in the caller's per-entry transaction. Entries, sources, threat
//! actors and the association/alias tables are insert-or-ignore. References
//! and report names are plain inserts, so loading the same one twice stores
//! it twice.
//!
//! Each function returns the number of rows actually written; ignored rows
//! count as zero.

use crate::error::EntryError;
use crate::library::{verbatim, LibraryEntry, LibrarySource, LibraryThreatActor};
use crate::schema::*;
use crate::timestamp::normalize;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde_json::Value;

type Result<T> = std::result::Result<T, EntryError>;

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable entry
#[derive(Insertable)]
#[diesel(table_name = entries)]
pub struct NewEntry<'a> {
    pub id: &'a str,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub sha1_hash: Option<&'a str>,
    pub title: Option<&'a str>,
    pub authors: Option<String>,
    pub file_creation_date: Option<String>,
    pub file_modification_date: Option<String>,
    pub file_size: Option<i64>,
    pub plain_text: Option<&'a str>,
    pub language: Option<&'a str>,
    pub ts_created_at: Option<String>,
    pub ts_updated_at: Option<String>,
    pub ts_creation_date: Option<String>,
    pub ts_modification_date: Option<String>,
    pub files_pdf: Option<&'a str>,
    pub files_text: Option<&'a str>,
    pub files_img: Option<&'a str>,
}

/// Insertable source
#[derive(Insertable)]
#[diesel(table_name = sources)]
pub struct NewSource<'a> {
    pub id: &'a str,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub name: Option<&'a str>,
    pub url: Option<&'a str>,
    pub description: Option<&'a str>,
    pub reports: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = entries_sources)]
pub struct NewEntrySource<'a> {
    pub entry_id: &'a str,
    pub source_id: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = references)]
pub struct NewReference<'a> {
    pub entry_id: &'a str,
    pub reference: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = report_names)]
pub struct NewReportName<'a> {
    pub entry_id: &'a str,
    pub report_name: &'a str,
}

/// Insertable threat actor
#[derive(Insertable)]
#[diesel(table_name = threat_actors)]
pub struct NewThreatActor<'a> {
    pub id: &'a str,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub main_name: Option<&'a str>,
    pub source_name: Option<&'a str>,
    pub tools: String,
    pub source_id: Option<&'a str>,
    pub reports: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = threat_actors_aliases)]
pub struct NewThreatActorAlias<'a> {
    pub threat_actor_id: &'a str,
    pub alias: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = entries_threat_actors)]
pub struct NewEntryThreatActor<'a> {
    pub entry_id: &'a str,
    pub threat_actor_id: &'a str,
}

impl<'a> NewEntry<'a> {
    pub fn from_library(entry: &'a LibraryEntry) -> Result<Self> {
        let files = entry.files.as_ref();

        Ok(Self {
            id: &entry.id,
            created_at: normalize(entry.created_at.as_deref()),
            updated_at: normalize(entry.updated_at.as_deref()),
            deleted_at: normalize(entry.deleted_at.as_deref()),
            sha1_hash: entry.sha1_hash.as_deref(),
            title: entry.title.as_deref(),
            authors: entry.authors.as_ref().map(serde_json::to_string).transpose()?,
            file_creation_date: normalize(entry.file_creation_date.as_deref()),
            file_modification_date: normalize(entry.file_modification_date.as_deref()),
            file_size: entry.file_size,
            plain_text: entry.plain_text.as_deref(),
            language: entry.language.as_deref(),
            ts_created_at: verbatim(entry.ts_created_at.as_ref()),
            ts_updated_at: verbatim(entry.ts_updated_at.as_ref()),
            ts_creation_date: verbatim(entry.ts_creation_date.as_ref()),
            ts_modification_date: verbatim(entry.ts_modification_date.as_ref()),
            files_pdf: files.and_then(|f| f.pdf.as_deref()),
            files_text: files.and_then(|f| f.text.as_deref()),
            files_img: files.and_then(|f| f.img.as_deref()),
        })
    }
}

impl<'a> NewSource<'a> {
    pub fn from_library(source: &'a LibrarySource) -> Result<Self> {
        Ok(Self {
            id: &source.id,
            created_at: normalize(source.created_at.as_deref()),
            updated_at: normalize(source.updated_at.as_deref()),
            deleted_at: normalize(source.deleted_at.as_deref()),
            name: source.name.as_deref(),
            url: source.url.as_deref(),
            description: source.description.as_deref(),
            reports: json_text(source.reports.as_ref())?,
        })
    }
}

impl<'a> NewThreatActor<'a> {
    pub fn from_library(actor: &'a LibraryThreatActor) -> Result<Self> {
        Ok(Self {
            id: &actor.id,
            created_at: normalize(actor.created_at.as_deref()),
            updated_at: normalize(actor.updated_at.as_deref()),
            deleted_at: normalize(actor.deleted_at.as_deref()),
            main_name: actor.main_name.as_deref(),
            source_name: actor.source_name.as_deref(),
            tools: serde_json::to_string(&actor.tools)?,
            source_id: actor.source_id.as_deref(),
            reports: json_text(actor.reports.as_ref())?,
        })
    }
}

/// JSON column text for an optional pass-through value; `null` stays NULL
fn json_text(value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
    }
}

// ============================================================================
// Mappers
// ============================================================================

/// Insert-or-ignore the entry row itself
pub fn insert_entry(conn: &mut SqliteConnection, entry: &LibraryEntry) -> Result<usize> {
    let row = NewEntry::from_library(entry)?;

    let written = diesel::insert_or_ignore_into(entries::table)
        .values(&row)
        .execute(conn)?;

    tracing::trace!(entry = %entry.id, written, "entry");
    Ok(written)
}

/// Insert-or-ignore the source, then link it to the entry
pub fn insert_source(
    conn: &mut SqliteConnection,
    source: &LibrarySource,
    entry_id: &str,
) -> Result<usize> {
    let row = NewSource::from_library(source)?;

    let mut written = diesel::insert_or_ignore_into(sources::table)
        .values(&row)
        .execute(conn)?;

    written += diesel::insert_or_ignore_into(entries_sources::table)
        .values(&NewEntrySource {
            entry_id,
            source_id: &source.id,
        })
        .execute(conn)?;

    tracing::trace!(entry = entry_id, source = %source.id, written, "source");
    Ok(written)
}

/// Plain insert; repeating a reference adds another row
pub fn insert_reference(
    conn: &mut SqliteConnection,
    reference: &str,
    entry_id: &str,
) -> Result<usize> {
    let written = diesel::insert_into(references::table)
        .values(&NewReference {
            entry_id,
            reference,
        })
        .execute(conn)?;

    Ok(written)
}

/// Plain insert; repeating a report name adds another row
pub fn insert_report_name(
    conn: &mut SqliteConnection,
    report_name: &str,
    entry_id: &str,
) -> Result<usize> {
    let written = diesel::insert_into(report_names::table)
        .values(&NewReportName {
            entry_id,
            report_name,
        })
        .execute(conn)?;

    Ok(written)
}

/// Insert-or-ignore the actor, its aliases, and the link to the entry
pub fn insert_threat_actor(
    conn: &mut SqliteConnection,
    actor: &LibraryThreatActor,
    entry_id: &str,
) -> Result<usize> {
    let row = NewThreatActor::from_library(actor)?;

    let mut written = diesel::insert_or_ignore_into(threat_actors::table)
        .values(&row)
        .execute(conn)?;

    for alias in &actor.aliases {
        written += diesel::insert_or_ignore_into(threat_actors_aliases::table)
            .values(&NewThreatActorAlias {
                threat_actor_id: &actor.id,
                alias,
            })
            .execute(conn)?;
    }

    written += diesel::insert_or_ignore_into(entries_threat_actors::table)
        .values(&NewEntryThreatActor {
            entry_id,
            threat_actor_id: &actor.id,
        })
        .execute(conn)?;

    tracing::trace!(entry = entry_id, threat_actor = %actor.id, written, "threat actor");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::library::tests::{minimal_entry, source, threat_actor};
    use serde_json::json;

    fn entry(raw: serde_json::Value) -> LibraryEntry {
        LibraryEntry::from_value(&raw).unwrap()
    }

    fn actor(raw: serde_json::Value) -> LibraryThreatActor {
        serde_json::from_value(raw).unwrap()
    }

    // ==========================================================================
    // ENTRIES
    // ==========================================================================

    #[test]
    fn test_entry_row_is_normalized() {
        let mut db = Database::in_memory().unwrap();
        let mut raw = minimal_entry("e1");
        raw["files"] = json!({ "pdf": "files/e1.pdf" });
        let e = entry(raw);

        assert_eq!(insert_entry(db.connection(), &e).unwrap(), 1);

        let (created_at, authors, ts_created_at, files_pdf, files_text): (
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ) = entries::table
            .select((
                entries::created_at,
                entries::authors,
                entries::ts_created_at,
                entries::files_pdf,
                entries::files_text,
            ))
            .first(db.connection())
            .unwrap();

        assert_eq!(created_at.as_deref(), Some("2023-03-01T10:00:00.123000+00:00"));
        assert_eq!(authors.as_deref(), Some(r#"["Jane Analyst"]"#));
        assert_eq!(ts_created_at.as_deref(), Some("1677664800"));
        assert_eq!(files_pdf.as_deref(), Some("files/e1.pdf"));
        assert_eq!(files_text, None);
    }

    #[test]
    fn test_unparseable_timestamp_stored_as_null() {
        let mut db = Database::in_memory().unwrap();
        let mut raw = minimal_entry("e1");
        raw["updated_at"] = json!("last tuesday");

        insert_entry(db.connection(), &entry(raw)).unwrap();

        let updated_at: Option<String> = entries::table
            .select(entries::updated_at)
            .first(db.connection())
            .unwrap();
        assert_eq!(updated_at, None);
    }

    #[test]
    fn test_entry_first_write_wins() {
        let mut db = Database::in_memory().unwrap();
        let first = entry(minimal_entry("e1"));
        let mut raw = minimal_entry("e1");
        raw["title"] = json!("Rewritten");
        let second = entry(raw);

        assert_eq!(insert_entry(db.connection(), &first).unwrap(), 1);
        assert_eq!(insert_entry(db.connection(), &second).unwrap(), 0);

        let title: Option<String> = entries::table
            .select(entries::title)
            .first(db.connection())
            .unwrap();
        assert_eq!(title.as_deref(), Some("Report e1"));
    }

    // ==========================================================================
    // SOURCES
    // ==========================================================================

    #[test]
    fn test_shared_source_stored_once() {
        let mut db = Database::in_memory().unwrap();
        let s: LibrarySource = serde_json::from_value(source("s1")).unwrap();

        for id in ["e1", "e2"] {
            insert_entry(db.connection(), &entry(minimal_entry(id))).unwrap();
            insert_source(db.connection(), &s, id).unwrap();
        }
        // Same pair again is ignored
        assert_eq!(insert_source(db.connection(), &s, "e1").unwrap(), 0);

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.sources, 1);
        assert_eq!(counts.entries_sources, 2);
    }

    #[test]
    fn test_source_reports_pass_through() {
        let mut db = Database::in_memory().unwrap();
        let mut raw = source("s1");
        raw["reports"] = json!(["r1", "r2"]);
        let s: LibrarySource = serde_json::from_value(raw).unwrap();

        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();
        insert_source(db.connection(), &s, "e1").unwrap();

        let reports: Option<String> = sources::table
            .select(sources::reports)
            .first(db.connection())
            .unwrap();
        assert_eq!(reports.as_deref(), Some(r#"["r1","r2"]"#));
    }

    // ==========================================================================
    // REFERENCES AND REPORT NAMES
    // ==========================================================================

    #[test]
    fn test_repeated_reference_adds_rows() {
        let mut db = Database::in_memory().unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();

        assert_eq!(insert_reference(db.connection(), "https://example.org/a", "e1").unwrap(), 1);
        assert_eq!(insert_reference(db.connection(), "https://example.org/a", "e1").unwrap(), 1);

        assert_eq!(db.table_counts().unwrap().references, 2);
    }

    #[test]
    fn test_repeated_report_name_adds_rows() {
        let mut db = Database::in_memory().unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e2"))).unwrap();

        insert_report_name(db.connection(), "Operation Example", "e1").unwrap();
        insert_report_name(db.connection(), "Operation Example", "e1").unwrap();
        insert_report_name(db.connection(), "Operation Example", "e2").unwrap();

        assert_eq!(db.table_counts().unwrap().report_names, 3);
    }

    #[test]
    fn test_report_name_needs_existing_entry() {
        let mut db = Database::in_memory().unwrap();
        let err = insert_report_name(db.connection(), "orphan", "missing").unwrap_err();
        assert!(matches!(err, EntryError::Database(_)), "{err}");
    }

    #[test]
    fn test_reference_needs_existing_entry() {
        let mut db = Database::in_memory().unwrap();
        assert!(insert_reference(db.connection(), "orphan", "missing").is_err());
    }

    // ==========================================================================
    // THREAT ACTORS
    // ==========================================================================

    #[test]
    fn test_threat_actor_with_aliases() {
        let mut db = Database::in_memory().unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();
        let t = actor(threat_actor("t1", json!(["x", "y", "x"])));

        // actor + two distinct aliases + association
        assert_eq!(insert_threat_actor(db.connection(), &t, "e1").unwrap(), 4);

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.threat_actors, 1);
        assert_eq!(counts.threat_actors_aliases, 2);
        assert_eq!(counts.entries_threat_actors, 1);
    }

    #[test]
    fn test_threat_actor_null_tools_and_aliases() {
        let mut db = Database::in_memory().unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();
        let mut raw = threat_actor("t1", serde_json::Value::Null);
        raw["tools"] = serde_json::Value::Null;

        insert_threat_actor(db.connection(), &actor(raw), "e1").unwrap();

        let tools: String = threat_actors::table
            .select(threat_actors::tools)
            .first(db.connection())
            .unwrap();
        assert_eq!(tools, "[]");
        assert_eq!(db.table_counts().unwrap().threat_actors_aliases, 0);
    }

    #[test]
    fn test_threat_actor_source_id_not_enforced() {
        let mut db = Database::in_memory().unwrap();
        insert_entry(db.connection(), &entry(minimal_entry("e1"))).unwrap();
        let mut raw = threat_actor("t1", json!([]));
        raw["source_id"] = json!("not-a-loaded-source");

        assert!(insert_threat_actor(db.connection(), &actor(raw), "e1").is_ok());
    }
}
