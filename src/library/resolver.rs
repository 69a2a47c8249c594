// src/library/resolver.rs
use itertools::Itertools;
use tracing::{debug, info, warn};

use super::tmdb::{Credits, MetadataProvider, MovieDetails, ProviderError};
use super::types::{FolderIdentity, MovieMetadata, LIST_SEPARATOR};

pub const DIRECTOR_JOB: &str = "Director";

/// Outcome of resolving one folder identity.
#[derive(Debug)]
pub enum Resolution {
    Found(MovieMetadata),
    /// The search returned no candidates.
    NotFound,
    /// Transport, status or payload failure at any step.
    Failed(ProviderError),
}

pub struct MetadataResolver<P> {
    provider: P,
}

impl<P: MetadataProvider> MetadataResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// search → first hit → details → credits. The folder year wins over the provider's.
    pub fn resolve(&self, identity: &FolderIdentity) -> Resolution {
        match self.try_resolve(identity) {
            Ok(Some(meta)) => {
                debug!("Resolved `{}` to TMDB id {}", identity.title, meta.tmdb_id);
                Resolution::Found(meta)
            }
            Ok(None) => {
                info!(
                    "No TMDB match for `{}` ({})",
                    identity.title,
                    year_label(identity.year)
                );
                Resolution::NotFound
            }
            Err(err) => {
                warn!(
                    "TMDB lookup failed for `{}` ({}): {err}",
                    identity.title,
                    year_label(identity.year)
                );
                Resolution::Failed(err)
            }
        }
    }

    fn try_resolve(&self, identity: &FolderIdentity) -> Result<Option<MovieMetadata>, ProviderError> {
        let hits = self.provider.search(&identity.title, identity.year)?;
        let Some(first) = hits.first() else {
            return Ok(None);
        };

        let details = self.provider.details(first.id)?;
        let credits = self.provider.credits(first.id)?;
        Ok(Some(self.assemble(identity, first.id, details, &credits)))
    }

    fn assemble(
        &self,
        identity: &FolderIdentity,
        id: i64,
        details: MovieDetails,
        credits: &Credits,
    ) -> MovieMetadata {
        let title = details
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| identity.title.clone());
        let poster_url = details
            .poster_path
            .filter(|p| !p.trim().is_empty())
            .map(|p| self.provider.image_url(&p));

        MovieMetadata {
            title,
            year: identity.year,
            director: directors(credits),
            countries: details
                .production_countries
                .into_iter()
                .map(|c| c.iso_3166_1)
                .collect(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            rating: details.vote_average,
            plot: details.overview.filter(|p| !p.trim().is_empty()),
            poster_url,
            tmdb_id: id,
        }
    }
}

/// All crew credited as Director, joined in credit order.
pub fn directors(credits: &Credits) -> Option<String> {
    let joined = credits
        .crew
        .iter()
        .filter(|member| member.job == DIRECTOR_JOB)
        .map(|member| member.name.trim())
        .filter(|name| !name.is_empty())
        .join(LIST_SEPARATOR);
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn year_label(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "no year".into())
}
