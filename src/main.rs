// src/main.rs
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use movielib::config::{load_config, Settings, StartupScan};
use movielib::library::{build_library_scan, posters, Catalog, ExternalPlayer, TmdbLibraryScan};
use movielib::web::{self, AppState};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open (and migrate) the catalog, optionally wiping it. Returns the number of cataloged movies.
fn prepare_catalog(settings: &Settings) -> Result<i64, movielib::library::CatalogError> {
    let mut catalog = Catalog::open(&settings.database_path)?;
    if settings.rebuild_on_startup {
        let removed = catalog.clear()?;
        warn!("rebuild_on_startup: removed {removed} cataloged movies");
    }
    catalog.count()
}

fn startup_scan(settings: &Settings, scan: &TmdbLibraryScan, cataloged: i64) {
    let wanted = match settings.startup_scan {
        StartupScan::Always => true,
        StartupScan::IfEmpty => cataloged == 0,
        StartupScan::Never => false,
    };
    if !wanted {
        info!("Skipping startup scan ({cataloged} movies cataloged)");
        return;
    }
    info!("Scanning {}", scan.root().display());
    match scan.run() {
        Ok(report) => info!("Startup scan finished: {report}"),
        Err(err) => error!("Startup scan failed: {err}"),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let settings = match load_config().validate() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let cataloged = match prepare_catalog(&settings) {
        Ok(n) => n,
        Err(err) => {
            error!("Cannot open catalog {}: {err}", settings.database_path.display());
            return ExitCode::FAILURE;
        }
    };

    match posters::prune_stale_temp_files(&settings.posters_dir) {
        Ok(0) => {}
        Ok(n) => info!("Removed {n} partial poster files"),
        Err(err) => warn!("Failed to clean {}: {err}", settings.posters_dir.display()),
    }

    // The blocking HTTP client must be built and dropped outside the async runtime.
    let scan = match build_library_scan(&settings) {
        Ok(scan) => Arc::new(scan),
        Err(err) => {
            error!("Failed to build HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };
    startup_scan(&settings, &scan, cataloged);

    let state = AppState {
        db_path: settings.database_path.clone(),
        scanner: scan.clone(),
        player: Arc::new(ExternalPlayer::new(settings.player_cmd.as_deref())),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let served = runtime.block_on(web::run_server(state, &settings.posters_dir, &settings.bind_addr));
    drop(runtime);
    drop(scan);

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Server on {} failed: {err}", settings.bind_addr);
            ExitCode::FAILURE
        }
    }
}
