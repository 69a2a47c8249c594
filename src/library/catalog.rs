// src/library/catalog.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

use super::types::MovieRecord;

pub const CURRENT_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("schema migration {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },
    #[error("create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct Migration {
    version: u32,
    name: &'static str,
    apply: fn(&Connection) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "movies_table",
        apply: migrate_movies_table,
    },
    Migration {
        version: 2,
        name: "video_path_column",
        apply: migrate_video_path,
    },
    Migration {
        version: 3,
        name: "unique_folder_path",
        apply: migrate_unique_folder_path,
    },
];

fn migrate_movies_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS movies (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            year         INTEGER,
            director     TEXT,
            countries    TEXT,
            poster_path  TEXT,
            plot         TEXT,
            genres       TEXT,
            rating       FLOAT,
            folder_path  TEXT NOT NULL,
            last_updated DATETIME,
            tmdb_id      INTEGER
        );",
    )
}

fn migrate_video_path(conn: &Connection) -> rusqlite::Result<()> {
    // databases written by older scanners may already carry the column
    if column_exists(conn, "movies", "video_path")? {
        return Ok(());
    }
    conn.execute_batch("ALTER TABLE movies ADD COLUMN video_path TEXT;")
}

fn migrate_unique_folder_path(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DELETE FROM movies
          WHERE id NOT IN (SELECT MAX(id) FROM movies GROUP BY folder_path);
         CREATE UNIQUE INDEX IF NOT EXISTS idx_movies_folder_path ON movies(folder_path);
         CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);",
    )
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

const SELECT_COLUMNS: &str = "id, folder_path, title, year, director, countries, genres, rating, \
                              plot, poster_path, video_path, tmdb_id, last_updated";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MovieRecord> {
    Ok(MovieRecord {
        id: row.get(0)?,
        folder_path: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        director: row.get(4)?,
        countries: row.get(5)?,
        genres: row.get(6)?,
        rating: row.get(7)?,
        plot: row.get(8)?,
        poster_path: row.get(9)?,
        video_path: row.get(10)?,
        tmdb_id: row.get(11)?,
        last_updated: row.get(12)?,
    })
}

/// The movie catalog. One connection per owner; WAL lets the web layer read while a scan
/// writes through its own connection.
pub struct Catalog {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("Catalog {} journal_mode={mode}", path.display());

        let mut catalog = Self {
            conn,
            db_path: Some(path.to_path_buf()),
        };
        catalog.migrate()?;
        Ok(catalog)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let mut catalog = Self {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        catalog.migrate()?;
        Ok(catalog)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn schema_version(&self) -> Result<u32, CatalogError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn migrate(&mut self) -> Result<(), CatalogError> {
        let current = self.schema_version()?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let wrap = |source| CatalogError::Migration {
                version: migration.version,
                source,
            };
            let tx = self.conn.transaction().map_err(wrap)?;
            (migration.apply)(&tx).map_err(wrap)?;
            tx.pragma_update(None, "user_version", migration.version)
                .map_err(wrap)?;
            tx.commit().map_err(wrap)?;
            info!(
                "Catalog migrated to schema {} ({})",
                migration.version, migration.name
            );
        }
        Ok(())
    }

    pub fn exists(&self, folder_path: &str) -> Result<bool, CatalogError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM movies WHERE folder_path = ?1",
                [folder_path],
                |_row| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert or replace the record for `record.folder_path` as one transaction.
    /// Returns the row id.
    pub fn upsert(&mut self, record: &MovieRecord) -> Result<i64, CatalogError> {
        let tx = self.conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO movies (
                title, year, director, countries, poster_path, plot, genres, rating,
                folder_path, last_updated, tmdb_id, video_path
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(folder_path) DO UPDATE SET
                title = excluded.title,
                year = excluded.year,
                director = excluded.director,
                countries = excluded.countries,
                poster_path = excluded.poster_path,
                plot = excluded.plot,
                genres = excluded.genres,
                rating = excluded.rating,
                last_updated = excluded.last_updated,
                tmdb_id = excluded.tmdb_id,
                video_path = excluded.video_path
             RETURNING id",
            params![
                record.title,
                record.year,
                record.director,
                record.countries,
                record.poster_path,
                record.plot,
                record.genres,
                record.rating,
                record.folder_path,
                record.last_updated,
                record.tmdb_id,
                record.video_path,
            ],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// All records by title (then folder path for equal titles).
    pub fn list_all(&self) -> Result<Vec<MovieRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM movies ORDER BY title, folder_path"
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get(&self, id: i64) -> Result<Option<MovieRecord>, CatalogError> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM movies WHERE id = ?1"),
                [id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> Result<i64, CatalogError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?)
    }

    /// Drop every record; only used for an operator-requested full rebuild.
    pub fn clear(&mut self) -> Result<usize, CatalogError> {
        Ok(self.conn.execute("DELETE FROM movies", [])?)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(folder: &str, title: &str) -> MovieRecord {
        MovieRecord {
            id: None,
            folder_path: folder.into(),
            title: title.into(),
            year: Some(2010),
            director: Some("Christopher Nolan".into()),
            countries: Some("US, GB".into()),
            genres: Some("Action, Sci-Fi".into()),
            rating: Some(8.8),
            plot: Some("Dreams.".into()),
            poster_path: None,
            video_path: None,
            tmdb_id: Some(27205),
            last_updated: NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(12, 30, 0)),
        }
    }

    #[test]
    fn upsert_then_exists() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        assert!(!catalog.exists("/m/Inception (2010)").unwrap());
        catalog.upsert(&record("/m/Inception (2010)", "Inception")).unwrap();
        assert!(catalog.exists("/m/Inception (2010)").unwrap());
        assert_eq!(catalog.count().unwrap(), 1);
    }

    #[test]
    fn upsert_same_path_updates_in_place() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.upsert(&record("/m/Heat (1995)", "Heat")).unwrap();

        let mut updated = record("/m/Heat (1995)", "Heat");
        updated.poster_path = Some("/static/Heat.jpg".into());
        updated.video_path = Some("/m/Heat (1995)/heat.mkv".into());
        let second = catalog.upsert(&updated).unwrap();

        assert_eq!(first, second);
        assert_eq!(catalog.count().unwrap(), 1);
        let stored = catalog.get(first).unwrap().unwrap();
        assert_eq!(stored.poster_path.as_deref(), Some("/static/Heat.jpg"));
        assert_eq!(stored.video_path.as_deref(), Some("/m/Heat (1995)/heat.mkv"));
        assert_eq!(stored.last_updated, updated.last_updated);
    }

    #[test]
    fn list_all_is_sorted_by_title() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        for (folder, title) in [("/m/c", "Zodiac"), ("/m/a", "Alien"), ("/m/b", "Memento")] {
            catalog.upsert(&record(folder, title)).unwrap();
        }
        let titles: Vec<String> = catalog
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Alien", "Memento", "Zodiac"]);
    }

    #[test]
    fn get_unknown_id_is_none() {
        let catalog = Catalog::open_in_memory().unwrap();
        assert!(catalog.get(42).unwrap().is_none());
    }

    #[test]
    fn fresh_catalog_is_at_current_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/movies.db");
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(catalog.path(), Some(path.as_path()));
        drop(catalog);

        // reopening is a no-op
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn legacy_database_is_migrated_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.db");
        {
            let conn = Connection::open(&path).unwrap();
            migrate_movies_table(&conn).unwrap();
            conn.execute_batch(
                "INSERT INTO movies (title, year, folder_path, last_updated)
                     VALUES ('Heat', 1995, '/m/Heat (1995)', '2023-01-01 10:00:00.000000');
                 INSERT INTO movies (title, year, folder_path, last_updated)
                     VALUES ('Heat', 1995, '/m/Heat (1995)', '2023-02-01 10:00:00.000000');
                 INSERT INTO movies (title, year, folder_path)
                     VALUES ('Alien', 1979, '/m/Alien (1979)');",
            )
            .unwrap();
        }

        let mut catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(catalog.count().unwrap(), 2);

        let heat = catalog
            .list_all()
            .unwrap()
            .into_iter()
            .find(|r| r.title == "Heat")
            .unwrap();
        assert_eq!(heat.id, Some(2));
        assert_eq!(heat.video_path, None);
        assert!(heat.last_updated.is_some());

        // uniqueness now enforced through the upsert path
        catalog.upsert(&record("/m/Heat (1995)", "Heat")).unwrap();
        assert_eq!(catalog.count().unwrap(), 2);
    }

    #[test]
    fn table_created_with_video_path_is_left_alone() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_movies_table(&conn).unwrap();
        conn.execute_batch("ALTER TABLE movies ADD COLUMN video_path TEXT;")
            .unwrap();
        migrate_video_path(&conn).unwrap();
        assert!(column_exists(&conn, "movies", "video_path").unwrap());
    }

    #[test]
    fn clear_removes_all_rows() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.upsert(&record("/m/a", "Alien")).unwrap();
        catalog.upsert(&record("/m/b", "Brazil")).unwrap();
        assert_eq!(catalog.clear().unwrap(), 2);
        assert_eq!(catalog.count().unwrap(), 0);
    }
}
