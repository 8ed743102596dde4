use crate::bundle;
use crate::catalog::{CatalogApi, TmdbClient};
use crate::favorites::FavoritesStore;
use crate::models::MovieSummary;
use crate::night::{self, NightFilters};
use crate::ranker;
use anyhow::Result;
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, env, net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const PER_IP_LIMIT: u32 = 120; // per minute
const PER_IP_BURST: u32 = 20;
const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const DEFAULT_PORT: u16 = 3175;
const DEFAULT_REGION: &str = "IN";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub favorites: Arc<FavoritesStore>,
    pub default_region: String,
    pub rate_limits: Arc<Mutex<HashMap<String, WindowCounter>>>,
}

#[derive(Clone, Debug)]
pub struct WindowCounter {
    pub window: u64,
    pub count: u32,
}

pub async fn run_server() -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::from_env()?);
    let default_region = env::var("DEFAULT_REGION")
        .ok()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    info!("Default watch-provider region: {}", default_region);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let state = AppState {
        catalog,
        favorites: Arc::new(FavoritesStore::new()),
        default_region,
        rate_limits: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/movies/popular", get(popular))
        .route("/movies/search", get(search))
        .route("/movies/:id/bundle", get(movie_bundle))
        .route("/movies/:id/because-you-liked", get(because_you_liked))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/:id", delete(remove_favorite))
        .route("/recommendations", get(recommendations))
        .route("/taste", get(taste_profile))
        .route("/movie-night", post(movie_night))
        .route("/movie-night/moods", get(list_moods))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    page: Option<u32>,
}

#[derive(Deserialize)]
struct RegionParams {
    region: Option<String>,
}

async fn popular(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    match state
        .catalog
        .popular_movies(params.page.unwrap_or(1))
        .await
    {
        Ok(movies) => (StatusCode::OK, Json(movies)).into_response(),
        Err(e) => catalog_failure(e),
    }
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let Some(query) = params.query.filter(|q| !q.trim().is_empty()) else {
        return bad_request("Missing search query");
    };
    match state
        .catalog
        .search_movies(&query, params.page.unwrap_or(1))
        .await
    {
        Ok(movies) => (StatusCode::OK, Json(movies)).into_response(),
        Err(e) => catalog_failure(e),
    }
}

async fn movie_bundle(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<RegionParams>,
) -> Response {
    let region = params
        .region
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.default_region.clone());
    match bundle::fetch_movie_detail_bundle(state.catalog.as_ref(), id, &region).await {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(e) => catalog_failure(e),
    }
}

async fn because_you_liked(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PageParams>,
) -> Response {
    match bundle::because_you_liked(state.catalog.as_ref(), id, params.page.unwrap_or(1)).await {
        Ok(movies) => (StatusCode::OK, Json(movies)).into_response(),
        Err(e) => catalog_failure(e),
    }
}

async fn list_favorites(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.favorites.snapshot().await)).into_response()
}

async fn add_favorite(State(state): State<AppState>, Json(movie): Json<MovieSummary>) -> Response {
    let title = movie.title.clone();
    if state.favorites.add(movie).await {
        info!("Favorited '{}'", title);
        (StatusCode::CREATED, Json(json!({"status": "ok"}))).into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({"status": "error", "message": "Already favorited"})),
        )
            .into_response()
    }
}

async fn remove_favorite(State(state): State<AppState>, Path(id): Path<i32>) -> Response {
    if state.favorites.remove(id).await {
        info!("Unfavorited id {}", id);
        (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "Not in favorites"})),
        )
            .into_response()
    }
}

async fn recommendations(State(state): State<AppState>) -> Response {
    let favorites = state.favorites.snapshot().await;
    let top_genres = ranker::rank_top_genres(&favorites, ranker::DEFAULT_TOP_GENRES);
    let exclude = favorites.iter().map(|m| m.id).collect();
    match ranker::recommend_from_genres(state.catalog.as_ref(), &top_genres, &exclude).await {
        Ok(movies) => (StatusCode::OK, Json(movies)).into_response(),
        Err(e) => catalog_failure(e),
    }
}

async fn taste_profile(State(state): State<AppState>) -> Response {
    let favorites = state.favorites.snapshot().await;
    match ranker::compute_taste_statistics(&favorites) {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "No taste profile yet"})),
        )
            .into_response(),
    }
}

async fn list_moods() -> Response {
    (StatusCode::OK, Json(night::mood_names())).into_response()
}

#[derive(Deserialize)]
struct NightRequest {
    mood: Option<String>,
    genres: Option<Vec<i32>>,
    #[serde(default = "default_max_runtime")]
    max_runtime: u32,
    #[serde(default = "default_min_rating")]
    min_rating: f64,
    #[serde(default = "default_language")]
    language: String,
}

fn default_max_runtime() -> u32 {
    120
}

fn default_min_rating() -> f64 {
    7.0
}

fn default_language() -> String {
    "en".to_string()
}

async fn movie_night(State(state): State<AppState>, Json(req): Json<NightRequest>) -> Response {
    let genres = match (&req.genres, &req.mood) {
        (Some(genres), _) if !genres.is_empty() => genres.clone(),
        (_, Some(mood)) => match night::mood_genres(mood) {
            Some(genres) => genres.to_vec(),
            None => return bad_request(&format!("Unknown mood '{mood}'")),
        },
        _ => return bad_request("Either genres or mood is required"),
    };

    let filters = NightFilters {
        genres,
        max_runtime: req.max_runtime,
        min_rating: req.min_rating,
        language: req.language.clone(),
    };
    match night::generate_movie_night_pick(state.catalog.as_ref(), &filters).await {
        Ok(candidates) => match night::pick_one(&candidates) {
            Some(pick) => (StatusCode::OK, Json(pick)).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"status": "error", "message": "No titles matched the filters"})),
            )
                .into_response(),
        },
        Err(e) => catalog_failure(e),
    }
}

fn catalog_failure(err: anyhow::Error) -> Response {
    error!("Catalog request failed: {:?}", err);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"status": "error", "message": "Upstream catalog request failed"})),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = extract_ip(req.headers());
    if !check_rate_limit(&state, &ip).await {
        warn!("Rate limit exceeded for {}", ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"status": "error", "message": "Too many requests"})),
        )
            .into_response();
    }
    next.run(req).await
}

fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn check_rate_limit(state: &AppState, ip: &str) -> bool {
    let window = (Utc::now().timestamp() / 60) as u64;
    let mut guards = state.rate_limits.lock().await;
    if guards.len() > MAX_RATE_LIMIT_ENTRIES {
        guards.retain(|_, v| v.window == window);
    }
    let entry = guards
        .entry(ip.to_string())
        .or_insert(WindowCounter { window, count: 0 });
    if entry.window != window {
        entry.window = window;
        entry.count = 0;
    }
    if entry.count >= PER_IP_LIMIT + PER_IP_BURST {
        return false;
    }
    entry.count += 1;
    true
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
