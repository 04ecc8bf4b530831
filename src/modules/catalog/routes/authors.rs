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

use super::{MANAGE_AUTHORS, MODULE};
use crate::modules::catalog::forms::AuthorForm;
use crate::modules::catalog::models::{Author, AuthorDetail, AuthorId};
use crate::modules::catalog::CatalogState;
use crate::utils;

pub(super) async fn list(
    State(state): State<CatalogState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Author>>, AppError> {
    Ok(Json(state.store.list_authors(page).await?))
}

pub(super) async fn detail(
    State(state): State<CatalogState>,
    Path(id): Path<AuthorId>,
) -> Result<Json<AuthorDetail>, AppError> {
    Ok(Json(state.store.author_detail(id).await?))
}

pub(super) async fn create(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<Author>), AppError> {
    authorize(&caller, &MANAGE_AUTHORS)?;
    let draft = json_body::<AuthorForm>(&body)?.validate()?;
    let author = state.store.create_author(draft).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

pub(super) async fn update(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<AuthorId>,
    body: Bytes,
) -> Result<Json<Author>, AppError> {
    authorize(&caller, &MANAGE_AUTHORS)?;
    let draft = json_body::<AuthorForm>(&body)?.validate()?;
    Ok(Json(state.store.update_author(id, draft).await?))
}

pub(super) async fn delete(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<AuthorId>,
) -> Result<Redirect, AppError> {
    authorize(&caller, &MANAGE_AUTHORS)?;
    state.store.delete_author(id).await?;
    Ok(Redirect::to(&utils::api_path(MODULE, "/authors")))
}
