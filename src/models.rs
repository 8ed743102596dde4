use serde::{Deserialize, Serialize};

/// Catalog snapshot of a single title as returned by list-style endpoints.
///
/// Genre data arrives in one of two wire shapes depending on the endpoint:
/// list endpoints carry a flat `genre_ids` array, the detail endpoint carries
/// `genres` objects. Both are kept as-is for serialization fidelity; ranking
/// code must go through [`MovieSummary::genre_id_set`] which normalizes to a
/// canonical id list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre_ids: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<GenreRef>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

impl MovieSummary {
    /// Canonical genre ids regardless of which wire shape this summary
    /// arrived in. The flat id list wins when both are present.
    pub fn genre_id_set(&self) -> Vec<i32> {
        if !self.genre_ids.is_empty() {
            return self.genre_ids.clone();
        }
        self.genres.iter().map(|g| g.id).collect()
    }

    /// Four-digit release year, if the release date has one.
    pub fn release_year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?;
        let year = date.split('-').next()?;
        if year.len() != 4 {
            return None;
        }
        year.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: i32,
    pub name: String,
}

/// Full detail record for a single title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    pub original_language: Option<String>,
    pub tagline: Option<String>,
    #[serde(default)]
    pub genres: Vec<GenreRef>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub character: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRef {
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub provider_id: i32,
    pub provider_name: String,
    pub logo_path: Option<String>,
}

/// Watch options for one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSet {
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
    #[serde(default)]
    pub rent: Vec<ProviderEntry>,
    #[serde(default)]
    pub buy: Vec<ProviderEntry>,
}

/// Denormalized per-title view model assembled by the aggregation engine.
/// Built once per detail view, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct MovieDetailBundle {
    pub details: MovieDetail,
    pub credits: Vec<CastMember>,
    pub trailer: Option<VideoRef>,
    pub provider_for_region: Option<ProviderSet>,
    pub similar: Vec<MovieSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenreCount {
    pub id: i32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketCount {
    pub label: String,
    pub count: usize,
}

/// Aggregate statistics over a favorites list.
#[derive(Debug, Clone, Serialize)]
pub struct TasteStats {
    pub total: usize,
    pub average_rating: f64,
    pub top_genres: Vec<GenreCount>,
    pub top_decades: Vec<BucketCount>,
    pub top_languages: Vec<BucketCount>,
}
