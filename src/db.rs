//! SQLite database with Diesel ORM
//!
//! One [`Database`] is one session: a single connection opened for the whole
//! run and closed when the value is dropped. Tables are created on connect if
//! they don't exist yet, so an empty database file is a valid target.

use crate::error::{LoadError, Result};
use crate::schema::*;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Database used when none is configured
pub const DEFAULT_DB_PATH: &str = "orkl.db";

/// Database session wrapping a single SQLite connection
pub struct Database {
    conn: SqliteConnection,
    url: String,
}

impl Database {
    /// Open the database at `url` (a file path, or `:memory:`)
    pub fn connect(url: &str) -> Result<Self> {
        let conn = SqliteConnection::establish(url)
            .map_err(|e| LoadError::Connection(format!("{url}: {e}")))?;

        let mut db = Self {
            conn,
            url: url.to_string(),
        };
        db.ensure_tables()?;
        tracing::debug!(url, "database session opened");
        Ok(db)
    }

    /// Fresh private database that disappears with the session
    pub fn in_memory() -> Result<Self> {
        Self::connect(":memory:")
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Run `f` in its own transaction.
    ///
    /// Any error rolls back everything `f` wrote and leaves the session usable.
    pub fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut SqliteConnection) -> std::result::Result<T, E>,
        E: From<diesel::result::Error>,
    {
        self.conn.transaction(f)
    }

    fn ensure_tables(&mut self) -> Result<()> {
        let conn = &mut self.conn;

        diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY NOT NULL,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                sha1_hash TEXT,
                title TEXT,
                authors TEXT,
                file_creation_date TEXT,
                file_modification_date TEXT,
                file_size INTEGER,
                plain_text TEXT,
                language TEXT,
                ts_created_at TEXT,
                ts_updated_at TEXT,
                ts_creation_date TEXT,
                ts_modification_date TEXT,
                files_pdf TEXT,
                files_text TEXT,
                files_img TEXT
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY NOT NULL,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                name TEXT,
                url TEXT,
                description TEXT,
                reports TEXT
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS entries_sources (
                entry_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                PRIMARY KEY (entry_id, source_id),
                FOREIGN KEY (entry_id) REFERENCES entries(id),
                FOREIGN KEY (source_id) REFERENCES sources(id)
            )
        "#).execute(conn)?;

        // No uniqueness on references or report names: an entry may repeat one
        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS "references" (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                entry_id TEXT NOT NULL,
                reference TEXT NOT NULL,
                FOREIGN KEY (entry_id) REFERENCES entries(id)
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS report_names (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                entry_id TEXT NOT NULL,
                report_name TEXT NOT NULL,
                FOREIGN KEY (entry_id) REFERENCES entries(id)
            )
        "#).execute(conn)?;

        // source_id is informational; actors may cite sources no entry carries
        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS threat_actors (
                id TEXT PRIMARY KEY NOT NULL,
                created_at TEXT,
                updated_at TEXT,
                deleted_at TEXT,
                main_name TEXT,
                source_name TEXT,
                tools TEXT NOT NULL DEFAULT '[]',
                source_id TEXT,
                reports TEXT
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS threat_actors_aliases (
                threat_actor_id TEXT NOT NULL,
                alias TEXT NOT NULL,
                PRIMARY KEY (threat_actor_id, alias),
                FOREIGN KEY (threat_actor_id) REFERENCES threat_actors(id)
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS entries_threat_actors (
                entry_id TEXT NOT NULL,
                threat_actor_id TEXT NOT NULL,
                PRIMARY KEY (entry_id, threat_actor_id),
                FOREIGN KEY (entry_id) REFERENCES entries(id),
                FOREIGN KEY (threat_actor_id) REFERENCES threat_actors(id)
            )
        "#).execute(conn)?;

        // Create indexes
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_entries_sha1 ON entries(sha1_hash)").execute(conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_entries_sources_source ON entries_sources(source_id)").execute(conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_entries_threat_actors_actor ON entries_threat_actors(threat_actor_id)").execute(conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_threat_actors_source ON threat_actors(source_id)").execute(conn)?;

        Ok(())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Row count of every table the loader writes
    pub fn table_counts(&mut self) -> Result<TableCounts> {
        let conn = &mut self.conn;

        Ok(TableCounts {
            entries: entries::table.count().get_result(conn)?,
            sources: sources::table.count().get_result(conn)?,
            entries_sources: entries_sources::table.count().get_result(conn)?,
            references: references::table.count().get_result(conn)?,
            report_names: report_names::table.count().get_result(conn)?,
            threat_actors: threat_actors::table.count().get_result(conn)?,
            threat_actors_aliases: threat_actors_aliases::table.count().get_result(conn)?,
            entries_threat_actors: entries_threat_actors::table.count().get_result(conn)?,
        })
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        tracing::debug!(url = %self.url, "database session closed");
    }
}

// ============================================================================
// Additional Types
// ============================================================================

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub entries: i64,
    pub sources: i64,
    pub entries_sources: i64,
    pub references: i64,
    pub report_names: i64,
    pub threat_actors: i64,
    pub threat_actors_aliases: i64,
    pub entries_threat_actors: i64,
}

impl std::fmt::Display for TableCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entries={} sources={} entries_sources={} references={} report_names={} \
             threat_actors={} threat_actors_aliases={} entries_threat_actors={}",
            self.entries,
            self.sources,
            self.entries_sources,
            self.references,
            self.report_names,
            self.threat_actors,
            self.threat_actors_aliases,
            self.entries_threat_actors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_starts_empty() {
        let mut db = Database::in_memory().unwrap();
        assert_eq!(db.table_counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn test_tables_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orkl.db");
        let url = path.to_string_lossy().to_string();

        {
            let mut db = Database::connect(&url).unwrap();
            diesel::sql_query("INSERT INTO entries (id) VALUES ('e1')")
                .execute(db.connection())
                .unwrap();
        }

        // Second connect runs the CREATE IF NOT EXISTS statements again
        let mut db = Database::connect(&url).unwrap();
        assert_eq!(db.table_counts().unwrap().entries, 1);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let mut db = Database::in_memory().unwrap();
        let result = diesel::sql_query(
            "INSERT INTO entries_sources (entry_id, source_id) VALUES ('missing', 'missing')",
        )
        .execute(db.connection());

        assert!(result.is_err(), "orphan association row must be rejected");
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let mut db = Database::in_memory().unwrap();

        let result: std::result::Result<(), diesel::result::Error> = db.transaction(|conn| {
            diesel::sql_query("INSERT INTO entries (id) VALUES ('e1')").execute(conn)?;
            diesel::sql_query("INSERT INTO entries (id) VALUES ('e1')").execute(conn)?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(db.table_counts().unwrap().entries, 0);

        // Session is still usable afterwards
        diesel::sql_query("INSERT INTO entries (id) VALUES ('e2')")
            .execute(db.connection())
            .unwrap();
        assert_eq!(db.table_counts().unwrap().entries, 1);
    }

    #[test]
    fn test_unreachable_database_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("no/such/dir/orkl.db").to_string_lossy().to_string();

        match Database::connect(&url) {
            Err(LoadError::Connection(msg)) => assert!(msg.contains("orkl.db")),
            Err(other) => panic!("expected connection error, got {other}"),
            Ok(_) => panic!("expected connection error"),
        }
    }
}
