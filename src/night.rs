use anyhow::Result;
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::catalog::{CatalogApi, DiscoverQuery};
use crate::models::MovieSummary;

/// Pages 1..=MAX_PICK_PAGE are all fair game for a pick, so repeated
/// generations with identical filters vary.
const MAX_PICK_PAGE: u32 = 5;

/// Named moods and the fixed genre-id sets they stand for.
static MOOD_PRESETS: Lazy<Vec<(&'static str, &'static [i32])>> = Lazy::new(|| {
    vec![
        ("chill", &[35, 10749][..]),
        ("dark", &[53, 27, 9648][..]),
        ("mindbend", &[878, 9648][..]),
        ("action", &[28, 12][..]),
        ("emotional", &[18][..]),
    ]
});

pub fn mood_genres(name: &str) -> Option<&'static [i32]> {
    MOOD_PRESETS
        .iter()
        .find(|(mood, _)| name.eq_ignore_ascii_case(mood))
        .map(|(_, genres)| *genres)
}

pub fn mood_names() -> Vec<&'static str> {
    MOOD_PRESETS.iter().map(|(mood, _)| *mood).collect()
}

/// Filter bounds for one movie-night generation.
#[derive(Debug, Clone)]
pub struct NightFilters {
    pub genres: Vec<i32>,
    pub max_runtime: u32,
    pub min_rating: f64,
    pub language: String,
}

/// One filtered discovery query, popularity-descending, on a random page
/// within the bounded range. Returns the whole candidate page; picking one is
/// a separate step so callers can re-roll without refetching.
pub async fn generate_movie_night_pick(
    catalog: &dyn CatalogApi,
    filters: &NightFilters,
) -> Result<Vec<MovieSummary>> {
    let query = DiscoverQuery {
        genres: filters.genres.clone(),
        max_runtime: Some(filters.max_runtime),
        min_rating: Some(filters.min_rating),
        language: Some(filters.language.clone()),
        page: rand::rng().random_range(1..=MAX_PICK_PAGE),
    };
    catalog.discover(&query).await
}

/// Uniform random element; an empty candidate list yields no pick.
pub fn pick_one(candidates: &[MovieSummary]) -> Option<&MovieSummary> {
    candidates.choose(&mut rand::rng())
}
