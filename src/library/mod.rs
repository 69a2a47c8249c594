// src/library/mod.rs

pub mod catalog;
pub mod identity;
pub mod media;
pub mod player;
pub mod posters;
pub mod resolver;
pub mod scan;
pub mod tmdb;
pub mod types;
pub mod walker;

pub use catalog::{Catalog, CatalogError};
pub use identity::parse_folder_name;
pub use player::{ExternalPlayer, MediaPlayer, PlayerError};
pub use posters::{AssetError, PosterCache, PosterStore};
pub use resolver::{MetadataResolver, Resolution};
pub use scan::{LibraryScan, Reconciler, Rescan, ScanError, ScanReport};
pub use tmdb::{MetadataProvider, ProviderError, TmdbClient};
pub use types::{FolderIdentity, MovieFolder, MovieMetadata, MovieRecord};
pub use walker::{LibraryWalker, TraversalError};

use crate::config::Settings;

/// The production scan job: TMDB over HTTP, posters into `posters_dir`.
pub type TmdbLibraryScan = LibraryScan<TmdbClient, PosterCache>;

/// Wire the pipeline from settings. One HTTP client is shared by API calls and posters.
pub fn build_library_scan(settings: &Settings) -> Result<TmdbLibraryScan, reqwest::Error> {
    let client = tmdb::build_http_client(settings)?;
    let resolver = MetadataResolver::new(TmdbClient::new(client.clone(), settings));
    let posters = PosterCache::new(
        client,
        settings.posters_dir.clone(),
        settings.poster_max_width,
    );
    Ok(LibraryScan::new(
        settings.movies_dir.clone(),
        settings.database_path.clone(),
        Reconciler::new(resolver, posters),
    ))
}
