// src/web/mod.rs
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::library::posters::POSTER_URL_PREFIX;
use crate::library::{Catalog, CatalogError, MediaPlayer, MovieRecord, PlayerError, Rescan, ScanError, ScanReport};

pub mod page;

#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub scanner: Arc<dyn Rescan>,
    pub player: Arc<dyn MediaPlayer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Success,
    Busy,
    Error,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: RefreshStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ScanReport>,
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        warn!("{} {} -> {} in {:?}", method, path, status, start.elapsed());
    } else {
        debug!("{} {} -> {} in {:?}", method, path, status, start.elapsed());
    }
    response
}

fn load_records(db_path: &FsPath) -> Result<Vec<MovieRecord>, CatalogError> {
    Catalog::open(db_path)?.list_all()
}

async fn records(state: &AppState) -> Result<Vec<MovieRecord>, Response> {
    let db_path = state.db_path.clone();
    match tokio::task::spawn_blocking(move || load_records(&db_path)).await {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(err)) => {
            error!("Failed to read catalog: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Catalog error: {err}")).into_response())
        }
        Err(err) => {
            error!("Catalog reader task failed: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn home(State(state): State<AppState>) -> Response {
    match records(&state).await {
        Ok(records) => Html(page::render_library(&records)).into_response(),
        Err(response) => response,
    }
}

async fn list_movies(State(state): State<AppState>) -> Response {
    match records(&state).await {
        Ok(records) => Json(records).into_response(),
        Err(response) => response,
    }
}

async fn refresh(State(state): State<AppState>) -> Response {
    let scanner = Arc::clone(&state.scanner);
    let outcome = tokio::task::spawn_blocking(move || scanner.rescan()).await;

    let (code, body) = match outcome {
        Ok(Ok(report)) => (
            StatusCode::OK,
            RefreshResponse {
                status: RefreshStatus::Success,
                message: format!("Library refreshed successfully: {report}"),
                report: Some(report),
            },
        ),
        Ok(Err(ScanError::Busy)) => (
            StatusCode::CONFLICT,
            RefreshResponse {
                status: RefreshStatus::Busy,
                message: ScanError::Busy.to_string(),
                report: None,
            },
        ),
        Ok(Err(err)) => {
            error!("Library refresh failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                RefreshResponse {
                    status: RefreshStatus::Error,
                    message: err.to_string(),
                    report: None,
                },
            )
        }
        Err(err) => {
            error!("Library refresh task failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                RefreshResponse {
                    status: RefreshStatus::Error,
                    message: "refresh task failed".into(),
                    report: None,
                },
            )
        }
    };
    (code, Json(body)).into_response()
}

enum PlayOutcome {
    Launched(String),
    NoRecord,
    NoFile,
    Player(PlayerError),
    Catalog(CatalogError),
}

fn play_blocking(db_path: &FsPath, player: &dyn MediaPlayer, id: i64) -> PlayOutcome {
    let record = match Catalog::open(db_path).and_then(|catalog| catalog.get(id)) {
        Ok(Some(record)) => record,
        Ok(None) => return PlayOutcome::NoRecord,
        Err(err) => return PlayOutcome::Catalog(err),
    };
    let Some(video) = record.video_path.as_deref() else {
        return PlayOutcome::NoFile;
    };
    match player.launch(FsPath::new(video)) {
        Ok(()) => PlayOutcome::Launched(record.title),
        Err(err) => PlayOutcome::Player(err),
    }
}

async fn play(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let db_path = state.db_path.clone();
    let player = Arc::clone(&state.player);
    let outcome = tokio::task::spawn_blocking(move || play_blocking(&db_path, player.as_ref(), id)).await;

    match outcome {
        Ok(PlayOutcome::Launched(title)) => {
            info!("Playing `{title}`");
            (StatusCode::OK, format!("Launched {title}")).into_response()
        }
        Ok(PlayOutcome::NoRecord) => (StatusCode::NOT_FOUND, "Movie not found").into_response(),
        Ok(PlayOutcome::NoFile) | Ok(PlayOutcome::Player(PlayerError::MissingFile(_))) => {
            (StatusCode::NOT_FOUND, "Movie file not found").into_response()
        }
        Ok(PlayOutcome::Player(err)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error launching movie: {err}")).into_response()
        }
        Ok(PlayOutcome::Catalog(err)) => {
            error!("Failed to read catalog: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Catalog error: {err}")).into_response()
        }
        Err(err) => {
            error!("Play task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(state: AppState, posters_dir: &FsPath) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/refresh", get(refresh).post(refresh))
        .route("/play/{id}", get(play))
        .route("/api/movies", get(list_movies))
        .nest_service(POSTER_URL_PREFIX, ServeDir::new(posters_dir))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run_server(state: AppState, posters_dir: &FsPath, bind_addr: &str) -> std::io::Result<()> {
    let app = make_app(state, posters_dir);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Serving movie library on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
