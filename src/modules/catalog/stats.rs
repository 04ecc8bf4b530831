//! Home page statistics and the per-session visit counter.

use libris_http::session::Session;
use serde::{Deserialize, Serialize};

use super::store::CatalogStore;

const NUM_VISITS: &str = "num_visits";

/// Optional overrides for the substring counters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub genre_contains: Option<String>,
    pub title_contains: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeStats {
    pub num_books: usize,
    pub num_instances: usize,
    pub num_instances_available: usize,
    pub num_authors: usize,
    pub genre_contains: String,
    pub num_genres_particular_word: usize,
    pub title_contains: String,
    pub num_books_particular_word: usize,
    pub num_visits: u64,
}

/// Count this view in the session: 1 on the first call, then 2, 3, ...
pub async fn record_visit(session: &Session) -> Result<u64, serde_json::Error> {
    let visits = session.get::<u64>(NUM_VISITS).await.unwrap_or(1);
    session.insert(NUM_VISITS, visits + 1).await?;
    Ok(visits)
}

pub async fn home_stats(
    store: &CatalogStore,
    session: &Session,
    genre_contains: String,
    title_contains: String,
) -> Result<HomeStats, serde_json::Error> {
    let counts = store.counts(&genre_contains, &title_contains).await;
    let num_visits = record_visit(session).await?;

    tracing::debug!(session_id = %session.id(), num_visits, "home page viewed");

    Ok(HomeStats {
        num_books: counts.books,
        num_instances: counts.instances,
        num_instances_available: counts.instances_available,
        num_authors: counts.authors,
        genre_contains,
        num_genres_particular_word: counts.genres_matching,
        title_contains,
        num_books_particular_word: counts.books_matching,
        num_visits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_http::session::SessionStore;

    #[tokio::test]
    async fn visits_count_up_per_session() {
        let sessions = SessionStore::new();
        let (mine, _) = sessions.open(None).await;
        let (theirs, _) = sessions.open(None).await;

        assert_eq!(record_visit(&mine).await.unwrap(), 1);
        assert_eq!(record_visit(&mine).await.unwrap(), 2);
        assert_eq!(record_visit(&theirs).await.unwrap(), 1);
        assert_eq!(record_visit(&mine).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn empty_catalog_reports_zeroes() {
        let store = CatalogStore::new();
        let sessions = SessionStore::new();
        let (session, _) = sessions.open(None).await;

        let stats = home_stats(&store, &session, "p".to_string(), "o".to_string())
            .await
            .unwrap();
        assert_eq!(stats.num_books, 0);
        assert_eq!(stats.num_genres_particular_word, 0);
        assert_eq!(stats.num_books_particular_word, 0);
        assert_eq!(stats.num_visits, 1);
    }
}
