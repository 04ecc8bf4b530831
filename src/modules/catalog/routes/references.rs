//! Genres and languages: flat lists of names.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use libris_authz::authorize;
use libris_http::{
    error::AppError,
    extract::{json_body, CurrentCaller},
};

use super::MANAGE_BOOKS;
use crate::modules::catalog::forms::NameForm;
use crate::modules::catalog::models::{Genre, GenreId, Language, LanguageId};
use crate::modules::catalog::CatalogState;

pub(super) async fn list_genres(State(state): State<CatalogState>) -> Json<Vec<Genre>> {
    Json(state.store.list_genres().await)
}

pub(super) async fn create_genre(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<Genre>), AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let name = json_body::<NameForm>(&body)?.validate()?;
    Ok((StatusCode::CREATED, Json(state.store.create_genre(name).await)))
}

pub(super) async fn delete_genre(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<GenreId>,
) -> Result<StatusCode, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    state.store.delete_genre(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_languages(State(state): State<CatalogState>) -> Json<Vec<Language>> {
    Json(state.store.list_languages().await)
}

pub(super) async fn create_language(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<Language>), AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let name = json_body::<NameForm>(&body)?.validate()?;
    Ok((
        StatusCode::CREATED,
        Json(state.store.create_language(name).await),
    ))
}

pub(super) async fn delete_language(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<LanguageId>,
) -> Result<StatusCode, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    state.store.delete_language(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
