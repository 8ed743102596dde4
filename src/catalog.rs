use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::models::{CastMember, MovieDetail, MovieSummary, ProviderSet, VideoRef};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";

/// Read-only boundary to the movie catalog. All queries are idempotent GETs;
/// there is no mutation path and no retry policy.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn popular_movies(&self, page: u32) -> Result<Vec<MovieSummary>>;
    async fn search_movies(&self, query: &str, page: u32) -> Result<Vec<MovieSummary>>;
    async fn movie_detail(&self, id: i32) -> Result<MovieDetail>;
    async fn movie_credits(&self, id: i32) -> Result<Vec<CastMember>>;
    async fn movie_videos(&self, id: i32) -> Result<Vec<VideoRef>>;
    async fn watch_providers(&self, id: i32) -> Result<HashMap<String, ProviderSet>>;
    async fn similar_movies(&self, id: i32, page: u32) -> Result<Vec<MovieSummary>>;
    async fn recommended_movies(&self, id: i32, page: u32) -> Result<Vec<MovieSummary>>;
    async fn discover(&self, query: &DiscoverQuery) -> Result<Vec<MovieSummary>>;
}

/// Filter set for the catalog's discovery endpoint. Results always come back
/// in the catalog's popularity ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverQuery {
    pub genres: Vec<i32>,
    pub max_runtime: Option<u32>,
    pub min_rating: Option<f64>,
    pub language: Option<String>,
    pub page: u32,
}

impl Default for DiscoverQuery {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            max_runtime: None,
            min_rating: None,
            language: None,
            page: 1,
        }
    }
}

impl DiscoverQuery {
    /// Query-string parameters, without the api key.
    pub fn to_query_string(&self) -> String {
        let mut params = String::from("language=en-US&sort_by=popularity.desc&include_adult=false");
        if !self.genres.is_empty() {
            let joined = self
                .genres
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push_str(&format!("&with_genres={joined}"));
        }
        if let Some(runtime) = self.max_runtime {
            params.push_str(&format!("&with_runtime.lte={runtime}"));
        }
        if let Some(rating) = self.min_rating {
            params.push_str(&format!("&vote_average.gte={rating}"));
        }
        if let Some(lang) = &self.language {
            params.push_str(&format!("&with_original_language={}", urlencoding::encode(lang)));
        }
        params.push_str(&format!("&page={}", self.page));
        params
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let user_agent = format!("reelscope/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build catalog HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self.client.get(url).send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<MovieSummary>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastMember>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    results: HashMap<String, ProviderSet>,
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn popular_movies(&self, page: u32) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{TMDB_BASE}/movie/popular?language=en-US&page={page}&api_key={}",
            self.api_key
        );
        let data: ListResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn search_movies(&self, query: &str, page: u32) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{TMDB_BASE}/search/movie?language=en-US&query={}&page={page}&include_adult=false&api_key={}",
            urlencoding::encode(query),
            self.api_key
        );
        let data: ListResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn movie_detail(&self, id: i32) -> Result<MovieDetail> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}?language=en-US&api_key={}",
            self.api_key
        );
        self.get_json(&url).await
    }

    async fn movie_credits(&self, id: i32) -> Result<Vec<CastMember>> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}/credits?language=en-US&api_key={}",
            self.api_key
        );
        let data: CreditsResponse = self.get_json(&url).await?;
        Ok(data.cast)
    }

    async fn movie_videos(&self, id: i32) -> Result<Vec<VideoRef>> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}/videos?language=en-US&api_key={}",
            self.api_key
        );
        let data: VideosResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn watch_providers(&self, id: i32) -> Result<HashMap<String, ProviderSet>> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}/watch/providers?api_key={}",
            self.api_key
        );
        let data: ProvidersResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn similar_movies(&self, id: i32, page: u32) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}/similar?language=en-US&page={page}&api_key={}",
            self.api_key
        );
        let data: ListResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn recommended_movies(&self, id: i32, page: u32) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{TMDB_BASE}/movie/{id}/recommendations?language=en-US&page={page}&api_key={}",
            self.api_key
        );
        let data: ListResponse = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn discover(&self, query: &DiscoverQuery) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{TMDB_BASE}/discover/movie?{}&api_key={}",
            query.to_query_string(),
            self.api_key
        );
        let data: ListResponse = self.get_json(&url).await?;
        Ok(data.results)
    }
}
