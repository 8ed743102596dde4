use anyhow::Result;
use std::collections::{HashMap, HashSet};

use crate::catalog::{CatalogApi, DiscoverQuery};
use crate::models::{BucketCount, GenreCount, MovieSummary, TasteStats};

pub const DEFAULT_TOP_GENRES: usize = 3;
const TASTE_TOP_GENRES: usize = 5;

/// Genre ids ranked by how often they occur across the favorites list,
/// descending. Ties keep first-encounter order: the sort is stable over the
/// order genres were first seen in.
pub fn rank_top_genres(favorites: &[MovieSummary], limit: usize) -> Vec<i32> {
    ranked_genre_frequencies(favorites)
        .into_iter()
        .take(limit)
        .map(|(id, _)| id)
        .collect()
}

/// Discovery-backed recommendations for a set of genres, with everything in
/// `exclude_ids` filtered out. Empty `genre_ids` short-circuits without a
/// catalog read. The full filtered page is returned; display capping is the
/// caller's concern.
pub async fn recommend_from_genres(
    catalog: &dyn CatalogApi,
    genre_ids: &[i32],
    exclude_ids: &HashSet<i32>,
) -> Result<Vec<MovieSummary>> {
    if genre_ids.is_empty() {
        return Ok(Vec::new());
    }
    let query = DiscoverQuery {
        genres: genre_ids.to_vec(),
        ..Default::default()
    };
    let discovered = catalog.discover(&query).await?;
    Ok(filter_excluded(discovered, exclude_ids))
}

/// Drops movies whose id is in the exclude set, preserving relative order.
/// Idempotent: re-filtering a filtered sequence changes nothing.
pub fn filter_excluded(
    movies: Vec<MovieSummary>,
    exclude_ids: &HashSet<i32>,
) -> Vec<MovieSummary> {
    movies
        .into_iter()
        .filter(|m| !exclude_ids.contains(&m.id))
        .collect()
}

/// Aggregate statistics over the favorites list, or `None` when there is no
/// list to profile yet.
pub fn compute_taste_statistics(favorites: &[MovieSummary]) -> Option<TasteStats> {
    if favorites.is_empty() {
        return None;
    }

    let total = favorites.len();
    let rating_sum: f64 = favorites.iter().map(|m| m.vote_average).sum();
    let average_rating = round_one_decimal(rating_sum / total as f64);

    let top_genres = ranked_genre_frequencies(favorites)
        .into_iter()
        .take(TASTE_TOP_GENRES)
        .map(|(id, count)| GenreCount { id, count })
        .collect();

    // A movie without a parseable release date still counts toward total and
    // average, just not toward any decade bucket.
    let top_decades = ranked_label_counts(
        favorites
            .iter()
            .filter_map(|m| m.release_year())
            .map(|year| format!("{}s", year / 10 * 10)),
    );

    let top_languages = ranked_label_counts(
        favorites
            .iter()
            .filter_map(|m| m.original_language.clone()),
    );

    Some(TasteStats {
        total,
        average_rating,
        top_genres,
        top_decades,
        top_languages,
    })
}

fn ranked_genre_frequencies(favorites: &[MovieSummary]) -> Vec<(i32, usize)> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    let mut first_seen: Vec<i32> = Vec::new();
    for movie in favorites {
        for id in movie.genre_id_set() {
            let entry = counts.entry(id).or_insert(0);
            if *entry == 0 {
                first_seen.push(id);
            }
            *entry += 1;
        }
    }
    let mut ranked: Vec<(i32, usize)> = first_seen.into_iter().map(|id| (id, counts[&id])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn ranked_label_counts(labels: impl Iterator<Item = String>) -> Vec<BucketCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for label in labels {
        let entry = counts.entry(label.clone()).or_insert(0);
        if *entry == 0 {
            first_seen.push(label);
        }
        *entry += 1;
    }
    let mut ranked: Vec<BucketCount> = first_seen
        .into_iter()
        .map(|label| {
            let count = counts[&label];
            BucketCount { label, count }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
