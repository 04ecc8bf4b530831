//! HTTP surface of the catalog module.
//!
//! Every handler starts by evaluating its [`Requirement`] so that a caller
//! without the right permission is turned away before the payload is read.

mod authors;
mod books;
mod loans;
mod references;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use libris_authz::{Permission, Requirement};
use libris_http::{error::AppError, extract::Query, session::Session};

use super::stats::{self, HomeStats, StatsQuery};
use super::CatalogState;

pub(crate) const MODULE: &str = "catalog";

pub(crate) const MANAGE_AUTHORS: Requirement =
    Requirement::permissions(&[Permission::CanManageAuthors]);
pub(crate) const MANAGE_BOOKS: Requirement =
    Requirement::permissions(&[Permission::CanManageBooks]);
pub(crate) const MARK_RETURNED: Requirement =
    Requirement::permissions(&[Permission::CanMarkReturned]);
pub(crate) const SEE_BORROWED: Requirement =
    Requirement::permissions(&[Permission::CanSeeBorrowed]);

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/books", get(books::list).post(books::create))
        .route(
            "/books/{id}",
            get(books::detail).put(books::update).delete(books::delete),
        )
        .route("/authors", get(authors::list).post(authors::create))
        .route(
            "/authors/{id}",
            get(authors::detail)
                .put(authors::update)
                .delete(authors::delete),
        )
        .route(
            "/genres",
            get(references::list_genres).post(references::create_genre),
        )
        .route("/genres/{id}", delete(references::delete_genre))
        .route(
            "/languages",
            get(references::list_languages).post(references::create_language),
        )
        .route("/languages/{id}", delete(references::delete_language))
        .route("/book-instances", post(loans::create_instance))
        .route(
            "/book-instances/{id}",
            get(loans::instance_detail)
                .put(loans::update_instance)
                .delete(loans::delete_instance),
        )
        .route(
            "/book-instances/{id}/renew",
            get(loans::renew_display).post(loans::renew_apply),
        )
        .route("/mybooks", get(loans::my_loans))
        .route("/borrowed", get(loans::all_loans))
        .with_state(state)
}

/// Home page counters; visible to everyone.
async fn home(
    State(state): State<CatalogState>,
    session: Session,
    Query(query): Query<StatsQuery>,
) -> Result<Json<HomeStats>, AppError> {
    let genre_contains = query
        .genre_contains
        .unwrap_or_else(|| state.settings.genre_keyword.clone());
    let title_contains = query
        .title_contains
        .unwrap_or_else(|| state.settings.title_keyword.clone());

    let stats = stats::home_stats(&state.store, &session, genre_contains, title_contains)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(stats))
}
