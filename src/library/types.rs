// src/library/types.rs
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Separator used when multi-valued fields are flattened for storage.
pub const LIST_SEPARATOR: &str = ", ";

// ---- identity ----
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderIdentity {
    pub title: String,
    pub year: Option<i32>,
}

/// A movie leaf found by the walker.
#[derive(Clone, Debug)]
pub struct MovieFolder {
    pub path: PathBuf,
    pub identity: FolderIdentity,
    pub media_file: Option<PathBuf>,
}

impl MovieFolder {
    /// Catalog key for this folder.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

// ---- provider output ----
#[derive(Clone, Debug, PartialEq)]
pub struct MovieMetadata {
    pub title: String,
    /// Always the year parsed from the folder name.
    pub year: Option<i32>,
    pub director: Option<String>,
    pub countries: Vec<String>,
    pub genres: Vec<String>,
    pub rating: Option<f64>,
    pub plot: Option<String>,
    pub poster_url: Option<String>,
    pub tmdb_id: i64,
}

// ---- persisted ----
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieRecord {
    /// Row id; `None` until the record has been written.
    pub id: Option<i64>,
    pub folder_path: String,
    pub title: String,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub countries: Option<String>,
    pub genres: Option<String>,
    pub rating: Option<f64>,
    pub plot: Option<String>,
    pub poster_path: Option<String>,
    pub video_path: Option<String>,
    pub tmdb_id: Option<i64>,
    /// Last successful reconciliation; absent on rows written by very old scanners.
    pub last_updated: Option<NaiveDateTime>,
}

impl MovieRecord {
    pub fn from_metadata(
        folder: &MovieFolder,
        meta: MovieMetadata,
        poster_path: Option<String>,
        last_updated: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            folder_path: folder.key(),
            title: meta.title,
            year: meta.year,
            director: meta.director,
            countries: join_list(&meta.countries),
            genres: join_list(&meta.genres),
            rating: meta.rating,
            plot: meta.plot,
            poster_path,
            video_path: folder
                .media_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            tmdb_id: Some(meta.tmdb_id),
            last_updated: Some(last_updated),
        }
    }

    pub fn genre_list(&self) -> Vec<String> {
        split_list(self.genres.as_deref())
    }

    pub fn country_list(&self) -> Vec<String> {
        split_list(self.countries.as_deref())
    }
}

fn join_list(items: &[String]) -> Option<String> {
    use itertools::Itertools;

    let joined = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .join(LIST_SEPARATOR);
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

pub(crate) fn split_list(stored: Option<&str>) -> Vec<String> {
    stored
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
