// src/library/scan.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::catalog::{Catalog, CatalogError};
use super::posters::PosterStore;
use super::resolver::{MetadataResolver, Resolution};
use super::tmdb::MetadataProvider;
use super::types::{MovieFolder, MovieRecord};
use super::walker::LibraryWalker;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("library root {} is missing or not a directory", .0.display())]
    RootMissing(PathBuf),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("a library scan is already running")]
    Busy,
}

/// Per-pass counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub discovered: usize,
    pub already_cataloged: usize,
    pub added: usize,
    pub not_found: usize,
    pub failed: usize,
    pub poster_failures: usize,
    pub traversal_errors: usize,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} movie folders: {} added, {} already cataloged, {} not found, {} failed \
             ({} poster failures, {} unreadable paths)",
            self.discovered,
            self.added,
            self.already_cataloged,
            self.not_found,
            self.failed,
            self.poster_failures,
            self.traversal_errors
        )
    }
}

enum FolderOutcome {
    AlreadyCataloged,
    Added { poster_failed: bool },
    NotFound,
    Failed,
}

/// Sequential reconciliation of one library root against the catalog.
pub struct Reconciler<P, S> {
    resolver: MetadataResolver<P>,
    posters: S,
}

impl<P: MetadataProvider, S: PosterStore> Reconciler<P, S> {
    pub fn new(resolver: MetadataResolver<P>, posters: S) -> Self {
        Self { resolver, posters }
    }

    pub fn resolver(&self) -> &MetadataResolver<P> {
        &self.resolver
    }

    pub fn posters(&self) -> &S {
        &self.posters
    }

    /// One full pass. Folders already in the catalog are never fetched again; per-folder
    /// failures are logged and counted, only a missing root aborts the pass.
    pub fn run(&self, root: &Path, catalog: &mut Catalog) -> Result<ScanReport, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::RootMissing(root.to_path_buf()));
        }
        info!("Library scan: walking {}", root.display());

        let mut report = ScanReport::default();
        for item in LibraryWalker::new(root) {
            let folder = match item {
                Ok(folder) => folder,
                Err(err) => {
                    warn!("Library scan: {err}");
                    report.traversal_errors += 1;
                    continue;
                }
            };
            report.discovered += 1;

            match self.reconcile_folder(&folder, catalog) {
                FolderOutcome::AlreadyCataloged => report.already_cataloged += 1,
                FolderOutcome::Added { poster_failed } => {
                    report.added += 1;
                    if poster_failed {
                        report.poster_failures += 1;
                    }
                }
                FolderOutcome::NotFound => report.not_found += 1,
                FolderOutcome::Failed => report.failed += 1,
            }
        }

        info!("Library scan finished: {report}");
        Ok(report)
    }

    fn reconcile_folder(&self, folder: &MovieFolder, catalog: &mut Catalog) -> FolderOutcome {
        let key = folder.key();
        match catalog.exists(&key) {
            Ok(true) => {
                debug!("Library scan: {key} already cataloged");
                return FolderOutcome::AlreadyCataloged;
            }
            Ok(false) => {}
            Err(err) => {
                error!("Library scan: catalog lookup for {key} failed: {err}");
                return FolderOutcome::Failed;
            }
        }

        let meta = match self.resolver.resolve(&folder.identity) {
            Resolution::Found(meta) => meta,
            Resolution::NotFound => return FolderOutcome::NotFound,
            Resolution::Failed(_) => return FolderOutcome::Failed,
        };

        let mut poster_failed = false;
        let poster_path = match meta.poster_url.as_deref() {
            Some(url) => match self.posters.store(url, &meta.title) {
                Ok(reference) => Some(reference),
                Err(err) => {
                    warn!("Library scan: poster for `{}` not stored: {err}", meta.title);
                    poster_failed = true;
                    None
                }
            },
            None => None,
        };

        let record =
            MovieRecord::from_metadata(folder, meta, poster_path, Local::now().naive_local());
        match catalog.upsert(&record) {
            Ok(id) => {
                info!("Library scan: added `{}` ({key}) as #{id}", record.title);
                FolderOutcome::Added { poster_failed }
            }
            Err(err) => {
                error!("Library scan: failed to store {key}: {err}");
                FolderOutcome::Failed
            }
        }
    }
}

/// Something the web layer can ask to rescan the library.
pub trait Rescan: Send + Sync {
    fn rescan(&self) -> Result<ScanReport, ScanError>;
}

/// A reconciler bound to a root and a catalog file, with a single-flight guard.
/// Every pass opens its own catalog connection.
pub struct LibraryScan<P, S> {
    root: PathBuf,
    db_path: PathBuf,
    reconciler: Reconciler<P, S>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<P: MetadataProvider, S: PosterStore> LibraryScan<P, S> {
    pub fn new(root: PathBuf, db_path: PathBuf, reconciler: Reconciler<P, S>) -> Self {
        Self {
            root,
            db_path,
            reconciler,
            running: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn run(&self) -> Result<ScanReport, ScanError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::Busy);
        }
        let _guard = RunningGuard(&self.running);

        let mut catalog = Catalog::open(&self.db_path)?;
        self.reconciler.run(&self.root, &mut catalog)
    }
}

impl<P, S> Rescan for LibraryScan<P, S>
where
    P: MetadataProvider + Send + Sync,
    S: PosterStore + Send + Sync,
{
    fn rescan(&self) -> Result<ScanReport, ScanError> {
        self.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::posters::tests::FakePosterStore;
    use crate::library::resolver::tests::FakeProvider;
    use std::fs;

    fn reconciler(provider: FakeProvider, posters: FakePosterStore) -> Reconciler<FakeProvider, FakePosterStore> {
        Reconciler::new(MetadataResolver::new(provider), posters)
    }

    fn library_with(folders: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for folder in folders {
            fs::create_dir_all(dir.path().join(folder)).unwrap();
        }
        dir
    }

    #[test]
    fn inception_folder_becomes_a_full_record() {
        let lib = library_with(&["Inception (2010)"]);
        fs::write(lib.path().join("Inception (2010)/Inception.mkv"), b"x").unwrap();
        let mut catalog = Catalog::open_in_memory().unwrap();
        let scan = reconciler(FakeProvider::inception(), FakePosterStore::default());

        let report = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.discovered, 1);

        let records = catalog.list_all().unwrap();
        assert_eq!(records.len(), 1);
        let movie = &records[0];
        assert_eq!(movie.title, "Inception");
        assert_eq!(movie.year, Some(2010));
        assert_eq!(movie.director.as_deref(), Some("Christopher Nolan"));
        assert_eq!(movie.genre_list(), vec!["Action", "Sci-Fi"]);
        assert_eq!(movie.country_list(), vec!["US", "GB"]);
        assert_eq!(movie.rating, Some(8.8));
        assert_eq!(movie.poster_path.as_deref(), Some("/static/Inception.jpg"));
        assert_eq!(movie.tmdb_id, Some(27205));
        assert!(movie.last_updated.is_some());
        assert_eq!(
            movie.video_path.as_deref().map(Path::new),
            Some(lib.path().join("Inception (2010)/Inception.mkv").as_path())
        );
        assert_eq!(
            movie.folder_path,
            lib.path().join("Inception (2010)").to_string_lossy()
        );
    }

    #[test]
    fn rescan_does_not_refetch_known_folders() {
        let lib = library_with(&["Inception (2010)", "Nolan/Memento (2000)"]);
        let mut catalog = Catalog::open_in_memory().unwrap();
        let scan = reconciler(FakeProvider::inception(), FakePosterStore::default());

        let first = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(first.added, 2);
        assert_eq!(scan.resolver().provider().searches.get(), 2);

        let second = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.already_cataloged, 2);
        assert_eq!(scan.resolver().provider().searches.get(), 2);
        assert_eq!(scan.posters().calls.get(), 2);
        assert_eq!(catalog.count().unwrap(), 2);
    }

    #[test]
    fn not_found_writes_nothing() {
        let lib = library_with(&["Obscure Short (1931)"]);
        let mut catalog = Catalog::open_in_memory().unwrap();
        let scan = reconciler(FakeProvider::empty(), FakePosterStore::default());

        let report = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.not_found, 1);
        assert_eq!(catalog.count().unwrap(), 0);
        assert_eq!(scan.posters().calls.get(), 0);
    }

    #[test]
    fn provider_failure_skips_folder_and_retries_next_pass() {
        let lib = library_with(&["Inception (2010)"]);
        let mut catalog = Catalog::open_in_memory().unwrap();

        let offline = reconciler(FakeProvider::offline(), FakePosterStore::default());
        let report = offline.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(catalog.count().unwrap(), 0);

        let online = reconciler(FakeProvider::inception(), FakePosterStore::default());
        let report = online.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.added, 1);
    }

    #[test]
    fn poster_failure_still_persists_record() {
        let lib = library_with(&["Inception (2010)"]);
        let mut catalog = Catalog::open_in_memory().unwrap();
        let posters = FakePosterStore {
            fail: true,
            ..FakePosterStore::default()
        };
        let scan = reconciler(FakeProvider::inception(), posters);

        let report = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.poster_failures, 1);
        let records = catalog.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].poster_path, None);
        assert_eq!(records[0].title, "Inception");
    }

    #[test]
    fn containers_and_posters_are_not_catalogued() {
        let lib = library_with(&["Alpha (1999)", "Beta/Gamma (2001)", "posters"]);
        let mut catalog = Catalog::open_in_memory().unwrap();
        let scan = reconciler(FakeProvider::inception(), FakePosterStore::default());

        let report = scan.run(lib.path(), &mut catalog).unwrap();
        assert_eq!(report.discovered, 2);

        let mut queried: Vec<(String, Option<i32>)> =
            scan.resolver().provider().queries.borrow().clone();
        queried.sort();
        assert_eq!(
            queried,
            vec![("Alpha".to_string(), Some(1999)), ("Gamma".to_string(), Some(2001))]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let lib = library_with(&[]);
        let mut catalog = Catalog::open_in_memory().unwrap();
        let scan = reconciler(FakeProvider::inception(), FakePosterStore::default());
        assert!(matches!(
            scan.run(&lib.path().join("gone"), &mut catalog),
            Err(ScanError::RootMissing(_))
        ));
    }

    #[test]
    fn library_scan_persists_to_its_own_database() {
        let lib = library_with(&["Inception (2010)"]);
        let db = lib.path().join("state/movies.db");
        let job = LibraryScan::new(
            lib.path().to_path_buf(),
            db.clone(),
            reconciler(FakeProvider::inception(), FakePosterStore::default()),
        );

        let report = job.run().unwrap();
        assert_eq!(report.added, 1);
        assert!(!job.is_running());

        let reader = Catalog::open(&db).unwrap();
        assert!(reader
            .exists(&lib.path().join("Inception (2010)").to_string_lossy())
            .unwrap());
    }

    #[test]
    fn concurrent_run_reports_busy() {
        let lib = library_with(&[]);
        let job = LibraryScan::new(
            lib.path().to_path_buf(),
            lib.path().join("movies.db"),
            reconciler(FakeProvider::inception(), FakePosterStore::default()),
        );
        job.running.store(true, Ordering::Release);
        assert!(matches!(job.run(), Err(ScanError::Busy)));
        job.running.store(false, Ordering::Release);
        assert!(job.run().is_ok());
    }
}
