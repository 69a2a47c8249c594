// src/library/tmdb.rs
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unexpected response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

// ---- wire models ----
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_countries: Vec<ProductionCountry>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub name: String,
    #[serde(default)]
    pub job: String,
}

/// The three read endpoints the resolver needs from a movie database.
pub trait MetadataProvider {
    /// Candidates in provider order; an empty list means "not found".
    fn search(&self, title: &str, year: Option<i32>) -> Result<Vec<SearchHit>, ProviderError>;
    fn details(&self, id: i64) -> Result<MovieDetails, ProviderError>;
    fn credits(&self, id: i64) -> Result<Credits, ProviderError>;
    /// Absolute URL for a provider-relative image path such as `/abc.jpg`.
    fn image_url(&self, poster_path: &str) -> String;
}

pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    image_base_url: String,
}

/// One shared blocking client with a bounded timeout, used for API calls and posters.
pub fn build_http_client(settings: &Settings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("movielib/", env!("CARGO_PKG_VERSION")))
        .timeout(settings.http_timeout)
        .connect_timeout(settings.http_timeout)
        .build()
}

impl TmdbClient {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            api_key: settings.tmdb_api_key.clone(),
            base_url: settings.tmdb_base_url.clone(),
            image_base_url: settings.tmdb_image_base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.url(path);
        debug!("TMDB GET {url}");
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()?;
        handle_response(&url, response)
    }
}

fn handle_response<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = response.bytes()?;
    serde_json::from_slice(&body).map_err(|err| ProviderError::Malformed {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

impl MetadataProvider for TmdbClient {
    fn search(&self, title: &str, year: Option<i32>) -> Result<Vec<SearchHit>, ProviderError> {
        let mut query = vec![("query", title.to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        let response: SearchResponse = self.get_json("/search/movie", &query)?;
        Ok(response.results)
    }

    fn details(&self, id: i64) -> Result<MovieDetails, ProviderError> {
        self.get_json(
            &format!("/movie/{id}"),
            &[("append_to_response", "release_dates".to_string())],
        )
    }

    fn credits(&self, id: i64) -> Result<Credits, ProviderError> {
        self.get_json(&format!("/movie/{id}/credits"), &[])
    }

    fn image_url(&self, poster_path: &str) -> String {
        format!("{}{}", self.image_base_url, poster_path)
    }
}
