//! Copies, loan listings and the renewal form.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use libris_authz::{authenticated, authorize, Requirement};
use libris_db::{Page, PageRequest};
use libris_http::{
    error::AppError,
    extract::{json_body, CurrentCaller, Query},
};
use uuid::Uuid;

use super::{MANAGE_BOOKS, MARK_RETURNED, MODULE, SEE_BORROWED};
use crate::modules::catalog::forms::{BookInstanceForm, RenewalForm};
use crate::modules::catalog::models::{BookInstance, InstanceId, LoanView};
use crate::modules::catalog::renewal::{self, RenewalOutcome, RenewalPage};
use crate::modules::catalog::store::LoanScope;
use crate::modules::catalog::CatalogState;
use crate::utils;

/// Copy ids are only parsed once the caller has passed the gate; a malformed
/// id names no copy.
fn parse_instance_id(raw: &str) -> Result<InstanceId, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::not_found(format!("book instance '{raw}' does not exist")))
}

pub(super) async fn my_loans(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<LoanView>>, AppError> {
    authorize(&caller, &Requirement::LOGIN)?;
    let principal = authenticated(&caller)?;
    let loans = state
        .store
        .loans(LoanScope::Borrower(&principal.username), page, utils::today())
        .await?;
    Ok(Json(loans))
}

pub(super) async fn all_loans(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<LoanView>>, AppError> {
    authorize(&caller, &SEE_BORROWED)?;
    let loans = state
        .store
        .loans(LoanScope::Everyone, page, utils::today())
        .await?;
    Ok(Json(loans))
}

pub(super) async fn instance_detail(
    State(state): State<CatalogState>,
    Path(id): Path<String>,
) -> Result<Json<LoanView>, AppError> {
    let id = parse_instance_id(&id)?;
    Ok(Json(state.store.loan_view(id, utils::today()).await?))
}

pub(super) async fn create_instance(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<BookInstance>), AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let draft = json_body::<BookInstanceForm>(&body)?.validate()?;
    let instance = state.store.create_instance(draft).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

pub(super) async fn update_instance(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<BookInstance>, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let id = parse_instance_id(&id)?;
    let draft = json_body::<BookInstanceForm>(&body)?.validate()?;
    Ok(Json(state.store.update_instance(id, draft).await?))
}

pub(super) async fn delete_instance(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorize(&caller, &MANAGE_BOOKS)?;
    let id = parse_instance_id(&id)?;
    state.store.delete_instance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn renew_display(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<RenewalPage>, AppError> {
    authorize(&caller, &MARK_RETURNED)?;
    let id = parse_instance_id(&id)?;
    Ok(Json(renewal::display(&state.store, id, utils::today()).await?))
}

/// 303 to the all-loans listing on success, 422 with the form otherwise.
pub(super) async fn renew_apply(
    State(state): State<CatalogState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    authorize(&caller, &MARK_RETURNED)?;
    let id = parse_instance_id(&id)?;

    let payload = if body.is_empty() {
        serde_json::Value::Null
    } else {
        json_body::<serde_json::Value>(&body)?
    };
    let form = RenewalForm::from_payload(&payload);

    match renewal::apply(&state.store, id, form, utils::today()).await? {
        RenewalOutcome::Renewed(_) => {
            Ok(Redirect::to(&utils::api_path(MODULE, "/borrowed")).into_response())
        }
        RenewalOutcome::Invalid(page) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response())
        }
    }
}
