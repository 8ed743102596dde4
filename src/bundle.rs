use anyhow::Result;
use std::collections::HashMap;

use crate::catalog::CatalogApi;
use crate::models::{MovieDetailBundle, MovieSummary, ProviderSet, VideoRef};

const VIDEO_HOST: &str = "YouTube";

/// Fetches the five per-title reads concurrently and merges them into one
/// view model. All-or-nothing: the first failing read fails the whole call,
/// so a caller never sees a bundle with silently missing pieces.
pub async fn fetch_movie_detail_bundle(
    catalog: &dyn CatalogApi,
    movie_id: i32,
    region: &str,
) -> Result<MovieDetailBundle> {
    let (details, credits, videos, providers, similar) = tokio::try_join!(
        catalog.movie_detail(movie_id),
        catalog.movie_credits(movie_id),
        catalog.movie_videos(movie_id),
        catalog.watch_providers(movie_id),
        catalog.similar_movies(movie_id, 1),
    )?;

    Ok(MovieDetailBundle {
        details,
        credits,
        trailer: select_trailer(&videos),
        provider_for_region: provider_for_region(&providers, region),
        similar,
    })
}

/// Recommendations for a title, falling back to the similar-titles listing
/// when the catalog has none. An empty final result is a valid outcome.
pub async fn because_you_liked(
    catalog: &dyn CatalogApi,
    movie_id: i32,
    page: u32,
) -> Result<Vec<MovieSummary>> {
    let recommendations = catalog.recommended_movies(movie_id, page).await?;
    if !recommendations.is_empty() {
        return Ok(recommendations);
    }
    catalog.similar_movies(movie_id, page).await
}

/// Prefer the first proper trailer hosted on the catalog's video platform;
/// fall back to the first clip on that platform regardless of type.
fn select_trailer(videos: &[VideoRef]) -> Option<VideoRef> {
    videos
        .iter()
        .find(|v| v.site.eq_ignore_ascii_case(VIDEO_HOST) && v.video_type == "Trailer")
        .or_else(|| videos.iter().find(|v| v.site.eq_ignore_ascii_case(VIDEO_HOST)))
        .cloned()
}

/// A region missing from the provider map means "no providers here", not an
/// error.
fn provider_for_region(
    providers: &HashMap<String, ProviderSet>,
    region: &str,
) -> Option<ProviderSet> {
    providers.get(&region.to_ascii_uppercase()).cloned()
}
