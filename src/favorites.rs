use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::models::MovieSummary;

/// Session-scoped favorites list. Ids are unique, insertion order is kept for
/// display. All mutation goes through `add`/`remove`; readers get snapshots,
/// so a render/query cycle never observes a half-applied change.
#[derive(Debug, Default)]
pub struct FavoritesStore {
    movies: Mutex<Vec<MovieSummary>>,
}

impl FavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the movie unless its id is already present. Returns whether
    /// the list changed.
    pub async fn add(&self, movie: MovieSummary) -> bool {
        let mut movies = self.movies.lock().await;
        if movies.iter().any(|m| m.id == movie.id) {
            return false;
        }
        movies.push(movie);
        true
    }

    /// Removes the movie with the given id, keeping the order of the rest.
    /// Returns whether anything was removed.
    pub async fn remove(&self, id: i32) -> bool {
        let mut movies = self.movies.lock().await;
        let before = movies.len();
        movies.retain(|m| m.id != id);
        movies.len() != before
    }

    pub async fn contains(&self, id: i32) -> bool {
        self.movies.lock().await.iter().any(|m| m.id == id)
    }

    /// Consistent copy of the current list.
    pub async fn snapshot(&self) -> Vec<MovieSummary> {
        self.movies.lock().await.clone()
    }

    /// Id set for recommendation exclusion.
    pub async fn ids(&self) -> HashSet<i32> {
        self.movies.lock().await.iter().map(|m| m.id).collect()
    }

    pub async fn len(&self) -> usize {
        self.movies.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.movies.lock().await.is_empty()
    }
}
