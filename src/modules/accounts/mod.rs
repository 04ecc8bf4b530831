//! Identity surface: where anonymous callers are sent, and who am I.
//!
//! Accounts are configured under `[auth.users]` and authenticate with a bearer
//! token, so the login page only explains how to present one.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use libris_authz::{authenticated, authorize, Principal, Requirement};
use libris_http::{
    error::AppError,
    extract::{CurrentCaller, Query},
};
use libris_kernel::{InitCtx, Module};
use serde::Deserialize;

pub struct AccountsModule;

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            users = ctx.settings.auth.users.len(),
            login_url = %ctx.settings.auth.login_url,
            "accounts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", get(login))
            .route("/me", get(me))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/login": {
                    "get": {
                        "summary": "How to authenticate",
                        "tags": ["Accounts"],
                        "parameters": [
                            {
                                "name": "next", "in": "query", "required": false,
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "401": { "description": "Present a bearer token and retry `next`" }
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "The signed-in account and its permissions",
                        "tags": ["Accounts"],
                        "responses": {
                            "200": {
                                "description": "Current principal",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Principal" }
                                    }
                                }
                            },
                            "302": { "description": "Not signed in; redirect to login" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Principal": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "permissions": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["username", "permissions"]
                    }
                }
            }
        }))
    }
}

async fn login(Query(query): Query<LoginQuery>) -> Response {
    let body = serde_json::json!({
        "message": "Authentication required. Send an `Authorization: Bearer <token>` header.",
        "next": query.next,
    });
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(body),
    )
        .into_response()
}

async fn me(CurrentCaller(caller): CurrentCaller) -> Result<Json<Principal>, AppError> {
    authorize(&caller, &Requirement::LOGIN)?;
    Ok(Json(authenticated(&caller)?.clone()))
}

pub fn create_module() -> Arc<dyn Module> {
    Arc::new(AccountsModule)
}
