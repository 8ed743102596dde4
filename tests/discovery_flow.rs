use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reelscope::app::{build_router, AppState};
use reelscope::catalog::{CatalogApi, DiscoverQuery};
use reelscope::favorites::FavoritesStore;
use reelscope::models::{
    CastMember, MovieDetail, MovieSummary, ProviderEntry, ProviderSet, VideoRef,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const MOVIE_ID: i32 = 101;

struct FakeCatalog {
    detail: MovieDetail,
    credits: Vec<CastMember>,
    videos: Vec<VideoRef>,
    providers: HashMap<String, ProviderSet>,
    similar: Vec<MovieSummary>,
    recommendations: Vec<MovieSummary>,
    discover_results: Vec<MovieSummary>,
    discover_queries: Mutex<Vec<DiscoverQuery>>,
    fail_videos: bool,
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn popular_movies(&self, _page: u32) -> Result<Vec<MovieSummary>> {
        Ok(self.similar.clone())
    }

    async fn search_movies(&self, _query: &str, _page: u32) -> Result<Vec<MovieSummary>> {
        Ok(self.similar.clone())
    }

    async fn movie_detail(&self, id: i32) -> Result<MovieDetail> {
        assert_eq!(id, self.detail.id);
        Ok(self.detail.clone())
    }

    async fn movie_credits(&self, _id: i32) -> Result<Vec<CastMember>> {
        Ok(self.credits.clone())
    }

    async fn movie_videos(&self, _id: i32) -> Result<Vec<VideoRef>> {
        if self.fail_videos {
            anyhow::bail!("video listing unavailable");
        }
        Ok(self.videos.clone())
    }

    async fn watch_providers(&self, _id: i32) -> Result<HashMap<String, ProviderSet>> {
        Ok(self.providers.clone())
    }

    async fn similar_movies(&self, _id: i32, _page: u32) -> Result<Vec<MovieSummary>> {
        Ok(self.similar.clone())
    }

    async fn recommended_movies(&self, _id: i32, _page: u32) -> Result<Vec<MovieSummary>> {
        Ok(self.recommendations.clone())
    }

    async fn discover(&self, query: &DiscoverQuery) -> Result<Vec<MovieSummary>> {
        self.discover_queries.lock().unwrap().push(query.clone());
        Ok(self.discover_results.clone())
    }
}

fn summary(id: i32, title: &str, genre_ids: &[i32]) -> MovieSummary {
    MovieSummary {
        id,
        title: title.to_string(),
        overview: String::new(),
        release_date: Some("2019-05-30".to_string()),
        vote_average: 7.5,
        original_language: Some("en".to_string()),
        genre_ids: genre_ids.to_vec(),
        genres: Vec::new(),
        poster_path: None,
        backdrop_path: None,
    }
}

fn video(site: &str, video_type: &str, key: &str) -> VideoRef {
    VideoRef {
        key: key.to_string(),
        name: format!("{key} clip"),
        site: site.to_string(),
        video_type: video_type.to_string(),
    }
}

fn fake_catalog() -> FakeCatalog {
    let mut providers = HashMap::new();
    providers.insert(
        "IN".to_string(),
        ProviderSet {
            link: Some("https://catalog.test/title/101/watch?locale=IN".to_string()),
            flatrate: vec![ProviderEntry {
                provider_id: 8,
                provider_name: "StreamBox".to_string(),
                logo_path: Some("/streambox.png".to_string()),
            }],
            rent: Vec::new(),
            buy: Vec::new(),
        },
    );

    FakeCatalog {
        detail: MovieDetail {
            id: MOVIE_ID,
            title: "Detail Movie".to_string(),
            overview: "A movie with everything".to_string(),
            release_date: Some("1994-07-06".to_string()),
            runtime: Some(112),
            vote_average: 8.1,
            vote_count: 1200,
            original_language: Some("en".to_string()),
            tagline: None,
            genres: vec![],
            poster_path: Some("/detail.jpg".to_string()),
            backdrop_path: None,
        },
        credits: vec![
            CastMember {
                id: 1,
                name: "Lead Actor".to_string(),
                character: "Protagonist".to_string(),
                profile_path: None,
            },
            CastMember {
                id: 2,
                name: "Supporting Actor".to_string(),
                character: "Friend".to_string(),
                profile_path: None,
            },
        ],
        videos: vec![
            video("YouTube", "Teaser", "teaser-key"),
            video("Vimeo", "Trailer", "vimeo-key"),
            video("YouTube", "Trailer", "trailer-key"),
        ],
        providers,
        similar: vec![summary(501, "Similar Movie", &[18])],
        recommendations: vec![summary(601, "Recommended Movie", &[18])],
        discover_results: vec![
            summary(701, "Discovered A", &[35]),
            summary(702, "Discovered B", &[10749]),
            summary(703, "Discovered C", &[35, 10749]),
        ],
        discover_queries: Mutex::new(Vec::new()),
        fail_videos: false,
    }
}

fn app_with_catalog(catalog: FakeCatalog) -> (Router, Arc<FakeCatalog>, Arc<FavoritesStore>) {
    let catalog = Arc::new(catalog);
    let favorites = Arc::new(FavoritesStore::new());
    let state = AppState {
        catalog: catalog.clone(),
        favorites: favorites.clone(),
        default_region: "IN".to_string(),
        rate_limits: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
    };
    (build_router(state), catalog, favorites)
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn bundle_merges_all_reads() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(get(&format!("/movies/{MOVIE_ID}/bundle")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bundle = body_json(res).await;
    assert_eq!(bundle["details"]["id"], MOVIE_ID);
    assert_eq!(bundle["details"]["runtime"], 112);
    assert_eq!(bundle["credits"].as_array().unwrap().len(), 2);
    // The proper trailer wins over the earlier teaser and the off-platform clip.
    assert_eq!(bundle["trailer"]["key"], "trailer-key");
    assert_eq!(
        bundle["provider_for_region"]["flatrate"][0]["provider_name"],
        "StreamBox"
    );
    assert_eq!(bundle["similar"][0]["id"], 501);
}

#[tokio::test]
async fn bundle_region_miss_is_not_an_error() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(get(&format!("/movies/{MOVIE_ID}/bundle?region=US")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bundle = body_json(res).await;
    assert!(bundle["provider_for_region"].is_null());
}

#[tokio::test]
async fn bundle_fails_as_whole_when_one_read_fails() {
    let mut catalog = fake_catalog();
    catalog.fail_videos = true;
    let (app, _, _) = app_with_catalog(catalog);

    let res = app
        .oneshot(get(&format!("/movies/{MOVIE_ID}/bundle")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    // No partial bundle on the error path, just the generic failure payload.
    let body = body_json(res).await;
    assert_eq!(body["status"], "error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn because_you_liked_prefers_recommendations() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(get(&format!("/movies/{MOVIE_ID}/because-you-liked")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body[0]["id"], 601);
}

#[tokio::test]
async fn because_you_liked_falls_back_to_similar() {
    let mut catalog = fake_catalog();
    catalog.recommendations = Vec::new();
    let (app, _, _) = app_with_catalog(catalog);

    let res = app
        .oneshot(get(&format!("/movies/{MOVIE_ID}/because-you-liked")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body[0]["id"], 501);
}

#[tokio::test]
async fn favorites_flow_rejects_duplicates() {
    let (app, _, favorites) = app_with_catalog(fake_catalog());
    let movie = json!({"id": 701, "title": "Discovered A", "genre_ids": [35]});

    let res = app
        .clone()
        .oneshot(post_json("/favorites", movie.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .clone()
        .oneshot(post_json("/favorites", movie))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(favorites.len().await, 1);

    let res = app
        .clone()
        .oneshot(Request::delete("/favorites/701").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(Request::delete("/favorites/701").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommendations_exclude_favorites_and_rank_genres() {
    let (app, catalog, _) = app_with_catalog(fake_catalog());

    // Two favorites sharing genre 35 make it the top-ranked genre.
    for movie in [
        json!({"id": 701, "title": "Discovered A", "genre_ids": [35, 10749]}),
        json!({"id": 99, "title": "Other Comedy", "genres": [{"id": 35, "name": "Comedy"}]}),
    ] {
        let res = app
            .clone()
            .oneshot(post_json("/favorites", movie))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = app.oneshot(get("/recommendations")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    // 701 is favorited; the catalog's relative order is preserved.
    assert_eq!(ids, vec![702, 703]);

    let queries = catalog.discover_queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].genres, vec![35, 10749]);
}

#[tokio::test]
async fn recommendations_without_favorites_issue_no_read() {
    let (app, catalog, _) = app_with_catalog(fake_catalog());

    let res = app.oneshot(get("/recommendations")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert!(body.as_array().unwrap().is_empty());
    assert!(catalog.discover_queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn taste_profile_absent_without_favorites() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app.oneshot(get("/taste")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn taste_profile_aggregates_favorites() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    for movie in [
        json!({"id": 1, "title": "Nineties", "genre_ids": [18], "vote_average": 7.25,
               "release_date": "1994-07-06", "original_language": "en"}),
        json!({"id": 2, "title": "Undated", "genre_ids": [18, 35], "vote_average": 8.0,
               "original_language": "ko"}),
    ] {
        let res = app
            .clone()
            .oneshot(post_json("/favorites", movie))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = app.oneshot(get("/taste")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let stats = body_json(res).await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["average_rating"], 7.6);
    assert_eq!(stats["top_genres"][0]["id"], 18);
    assert_eq!(stats["top_genres"][0]["count"], 2);
    // The undated favorite counts toward total but not toward any decade.
    assert_eq!(stats["top_decades"].as_array().unwrap().len(), 1);
    assert_eq!(stats["top_decades"][0]["label"], "1990s");
    assert_eq!(stats["top_languages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn movie_night_passes_filters_through() {
    let (app, catalog, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(post_json(
            "/movie-night",
            json!({"mood": "chill", "max_runtime": 120, "min_rating": 7.0, "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let pick = body_json(res).await;
    let picked_id = pick["id"].as_i64().unwrap();
    assert!([701, 702, 703].contains(&picked_id));

    let queries = catalog.discover_queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    let query = &queries[0];
    assert_eq!(query.genres, vec![35, 10749]);
    assert_eq!(query.max_runtime, Some(120));
    assert_eq!(query.min_rating, Some(7.0));
    assert_eq!(query.language.as_deref(), Some("en"));
    assert!((1..=5).contains(&query.page));
}

#[tokio::test]
async fn movie_night_explicit_genres_win_over_mood() {
    let (app, catalog, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(post_json(
            "/movie-night",
            json!({"mood": "chill", "genres": [878]}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let queries = catalog.discover_queries.lock().unwrap();
    assert_eq!(queries[0].genres, vec![878]);
}

#[tokio::test]
async fn moods_listing_names_all_presets() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app.oneshot(get("/movie-night/moods")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let moods = body_json(res).await;
    let names: Vec<&str> = moods
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["chill", "dark", "mindbend", "action", "emotional"]);
}

#[tokio::test]
async fn movie_night_rejects_unknown_mood() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app
        .oneshot(post_json("/movie-night", json!({"mood": "noir"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn movie_night_without_candidates_has_no_pick() {
    let mut catalog = fake_catalog();
    catalog.discover_results = Vec::new();
    let (app, _, _) = app_with_catalog(catalog);

    let res = app
        .oneshot(post_json("/movie-night", json!({"mood": "chill"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_requires_a_query() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    let res = app.oneshot(get("/movies/search")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limit_answers_429_once_exhausted() {
    let (app, _, _) = app_with_catalog(fake_catalog());

    // 300 requests guarantee one minute window sees more than the limit even
    // if a window boundary falls mid-loop.
    let mut limited = false;
    for _ in 0..300 {
        let res = app.clone().oneshot(get("/health")).await.unwrap();
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert!(limited, "limiter never tripped within 300 requests");
}
