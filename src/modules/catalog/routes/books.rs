use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use libris_authz::authorize;
use libris_db::{Page, PageRequest};
use libris_http::{
    error::AppError,
    extract::{json_body, CurrentCaller, Query},
};

use super::{MANAGE_BOOKS, MODULE};
use crate::modules::catalog::forms::BookForm;
use crate::modules::catalog::models::{Book, BookDetail, BookId};
use crate::modules::catalog::CatalogState;
use crate::utils;

pub(super) async fn list(
    State(state): State<CatalogState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Book>>, AppError> {
    Ok(Json(state.store.list_books(page).await?))
}

pub(super) async fn detail(
    State(state): State<CatalogState>,
    Path(id): Path<BookId>,
) -> Result<Json<BookDetail>, AppError> {
    Ok(Json(state.store.book_detail(id).await?))
}

pub(super) async fn create(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<Book>), AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let draft = json_body::<BookForm>(&body)?.validate()?;
    let book = state.store.create_book(draft).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub(super) async fn update(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<BookId>,
    body: Bytes,
) -> Result<Json<Book>, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let draft = json_body::<BookForm>(&body)?.validate()?;
    Ok(Json(state.store.update_book(id, draft).await?))
}

/// Refused with 403 while any copy is on loan; otherwise back to the book list.
pub(super) async fn delete(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<BookId>,
) -> Result<Redirect, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    state.store.delete_book(id).await?;
    Ok(Redirect::to(&utils::api_path(MODULE, "/books")))
}
