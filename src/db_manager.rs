use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::protocol::{MovieRecord, StoredRecord};

/// Lookup and insert over enriched movie records keyed by call number.
pub trait RecordStore {
    fn find(&self, call_number: &str) -> Result<Option<StoredRecord>, String>;
    /// Inserts the whole record or nothing.
    fn insert(&self, record: &MovieRecord) -> Result<(), String>;
}

const SELECT_MOVIE_SQL: &str = "SELECT poster_path FROM movies WHERE call_number = ?1";

pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        Self::with_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        db_manager.migrate()?;
        // Warm the statement cache so every per-entry lookup reuses one prepared statement.
        db_manager.conn.prepare_cached(SELECT_MOVIE_SQL)?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS movies (
                call_number TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                plot_short TEXT,
                runtime INTEGER NOT NULL,
                director TEXT,
                poster_path TEXT
            )",
            [],
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        // Databases created before poster paths were kept lack the column.
        let mut stmt = self.conn.prepare("PRAGMA table_info(movies)")?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut has_poster_path = false;
        for col in columns {
            if col? == "poster_path" {
                has_poster_path = true;
                break;
            }
        }

        if !has_poster_path {
            self.conn
                .execute("ALTER TABLE movies ADD COLUMN poster_path TEXT", [])?;
        }
        Ok(())
    }

    pub fn record_count(&self) -> Result<i64, rusqlite::Error> {
        self.conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))
    }

    #[cfg(test)]
    pub(crate) fn stored_record(&self, call_number: &str) -> Option<MovieRecord> {
        self.conn
            .query_row(
                "SELECT call_number, title, plot_short, runtime, director, poster_path
                 FROM movies WHERE call_number = ?1",
                params![call_number],
                |row| {
                    Ok(MovieRecord {
                        call_number: row.get(0)?,
                        title: row.get(1)?,
                        plot_summary: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        runtime_minutes: row.get(3)?,
                        director: row.get(4)?,
                        poster_path: row.get(5)?,
                    })
                },
            )
            .optional()
            .ok()
            .flatten()
    }
}

impl RecordStore for DbManager {
    fn find(&self, call_number: &str) -> Result<Option<StoredRecord>, String> {
        let mut stmt = self
            .conn
            .prepare_cached(SELECT_MOVIE_SQL)
            .map_err(|err| format!("failed to prepare movie lookup: {err}"))?;
        stmt.query_row(params![call_number], |row| {
            Ok(StoredRecord {
                poster_path: row.get(0)?,
            })
        })
        .optional()
        .map_err(|err| format!("failed to look up {call_number}: {err}"))
    }

    fn insert(&self, record: &MovieRecord) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT INTO movies (call_number, title, plot_short, runtime, director, poster_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.call_number,
                    record.title,
                    record.plot_summary,
                    record.runtime_minutes,
                    record.director,
                    record.poster_path
                ],
            )
            .map_err(|err| format!("failed to insert {}: {err}", record.call_number))?;
        Ok(())
    }
}
