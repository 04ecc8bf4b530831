//! The library catalog: books, authors, genres, languages, copies and loans.

pub mod forms;
pub mod models;
pub mod renewal;
mod routes;
pub mod seed;
pub mod stats;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{settings::CatalogSettings, settings::Settings, InitCtx, Module};

use crate::utils;
use store::CatalogStore;

/// State shared by every catalog handler.
#[derive(Clone)]
pub struct CatalogState {
    pub store: Arc<CatalogStore>,
    pub settings: Arc<CatalogSettings>,
}

pub struct CatalogModule {
    state: CatalogState,
}

impl CatalogModule {
    pub fn new(settings: CatalogSettings) -> Self {
        Self {
            state: CatalogState {
                store: Arc::new(CatalogStore::new()),
                settings: Arc::new(settings),
            },
        }
    }

    pub fn store(&self) -> Arc<CatalogStore> {
        Arc::clone(&self.state.store)
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        routes::MODULE
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if self.state.settings.seed_demo_data {
            seed::seed_demo_data(&self.state.store, utils::today()).await?;
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            seeded = self.state.settings.seed_demo_data,
            "catalog module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog module stopped");
        Ok(())
    }
}

/// Create the catalog module from application settings
pub fn create_module(settings: &Settings) -> Arc<dyn Module> {
    Arc::new(CatalogModule::new(settings.catalog.clone()))
}

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn schema_ref(name: &str) -> serde_json::Value {
    serde_json::json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn page_of(name: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "items": { "type": "array", "items": schema_ref(name) },
            "page": { "type": "integer" },
            "per_page": { "type": "integer" },
            "total_items": { "type": "integer" },
            "total_pages": { "type": "integer" },
            "has_next": { "type": "boolean" },
            "has_previous": { "type": "boolean" }
        }
    })
}

fn json_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "required": true,
        "content": { "application/json": { "schema": schema_ref(name) } }
    })
}

fn openapi() -> serde_json::Value {
    let page_param = serde_json::json!([{
        "name": "page", "in": "query", "required": false,
        "schema": { "type": "integer", "minimum": 1 }
    }]);
    let id_param = serde_json::json!([{
        "name": "id", "in": "path", "required": true, "schema": { "type": "integer" }
    }]);
    let uuid_param = serde_json::json!([{
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "string", "format": "uuid" }
    }]);

    serde_json::json!({
        "paths": {
            "": {
                "get": {
                    "summary": "Catalog statistics and session visit count",
                    "tags": ["Catalog"],
                    "parameters": [
                        {
                            "name": "genre_contains", "in": "query", "required": false,
                            "schema": { "type": "string" }
                        },
                        {
                            "name": "title_contains", "in": "query", "required": false,
                            "schema": { "type": "string" }
                        }
                    ],
                    "responses": {
                        "200": json_response("Home page counters", schema_ref("HomeStats"))
                    }
                }
            },
            "/books": {
                "get": {
                    "summary": "List books by title",
                    "tags": ["Books"],
                    "parameters": page_param,
                    "responses": {
                        "200": json_response("One page of books", page_of("Book")),
                        "404": error_response("Page out of range")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": json_body("BookForm"),
                    "responses": {
                        "201": json_response("Created", schema_ref("Book")),
                        "403": error_response("Missing catalog.can_manage_books"),
                        "422": error_response("Invalid form")
                    }
                }
            },
            "/books/{id}": {
                "get": {
                    "summary": "Book detail with its copies",
                    "tags": ["Books"],
                    "parameters": id_param,
                    "responses": {
                        "200": json_response("Book detail", schema_ref("Book")),
                        "404": error_response("No such book")
                    }
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "parameters": id_param,
                    "requestBody": json_body("BookForm"),
                    "responses": {
                        "200": json_response("Updated", schema_ref("Book")),
                        "403": error_response("Missing catalog.can_manage_books"),
                        "404": error_response("No such book"),
                        "422": error_response("Invalid form")
                    }
                },
                "delete": {
                    "summary": "Delete a book unless a copy is on loan",
                    "tags": ["Books"],
                    "parameters": id_param,
                    "responses": {
                        "303": { "description": "Deleted; redirect to the book list" },
                        "403": error_response("Missing permission or a copy is on loan"),
                        "404": error_response("No such book")
                    }
                }
            },
            "/authors": {
                "get": {
                    "summary": "List authors by last then first name",
                    "tags": ["Authors"],
                    "parameters": page_param,
                    "responses": {
                        "200": json_response("One page of authors", page_of("Author")),
                        "404": error_response("Page out of range")
                    }
                },
                "post": {
                    "summary": "Create an author",
                    "tags": ["Authors"],
                    "requestBody": json_body("AuthorForm"),
                    "responses": {
                        "201": json_response("Created", schema_ref("Author")),
                        "403": error_response("Missing catalog.can_manage_authors"),
                        "422": error_response("Invalid form")
                    }
                }
            },
            "/authors/{id}": {
                "get": {
                    "summary": "Author detail with their books",
                    "tags": ["Authors"],
                    "parameters": id_param,
                    "responses": {
                        "200": json_response("Author detail", schema_ref("Author")),
                        "404": error_response("No such author")
                    }
                },
                "put": {
                    "summary": "Update an author",
                    "tags": ["Authors"],
                    "parameters": id_param,
                    "requestBody": json_body("AuthorForm"),
                    "responses": {
                        "200": json_response("Updated", schema_ref("Author")),
                        "403": error_response("Missing catalog.can_manage_authors"),
                        "404": error_response("No such author"),
                        "422": error_response("Invalid form")
                    }
                },
                "delete": {
                    "summary": "Delete an author",
                    "tags": ["Authors"],
                    "parameters": id_param,
                    "responses": {
                        "303": { "description": "Deleted; redirect to the author list" },
                        "403": error_response("Missing catalog.can_manage_authors"),
                        "404": error_response("No such author")
                    }
                }
            },
            "/book-instances/{id}/renew": {
                "get": {
                    "summary": "Renewal form with a proposed due date",
                    "tags": ["Loans"],
                    "parameters": uuid_param,
                    "responses": {
                        "200": json_response("Copy and proposed date", schema_ref("RenewalPage")),
                        "403": error_response("Missing catalog.can_mark_returned"),
                        "404": error_response("No such copy")
                    }
                },
                "post": {
                    "summary": "Set a copy's due date",
                    "tags": ["Loans"],
                    "parameters": uuid_param,
                    "requestBody": json_body("RenewalForm"),
                    "responses": {
                        "303": { "description": "Renewed; redirect to all borrowed copies" },
                        "403": error_response("Missing catalog.can_mark_returned"),
                        "404": error_response("No such copy"),
                        "422": json_response(
                            "Form re-displayed with errors",
                            schema_ref("RenewalPage")
                        )
                    }
                }
            },
            "/mybooks": {
                "get": {
                    "summary": "Copies on loan to the caller",
                    "tags": ["Loans"],
                    "parameters": page_param,
                    "responses": {
                        "200": json_response("One page of loans", page_of("LoanView")),
                        "302": { "description": "Not signed in; redirect to login" }
                    }
                }
            },
            "/borrowed": {
                "get": {
                    "summary": "Every copy on loan",
                    "tags": ["Loans"],
                    "parameters": page_param,
                    "responses": {
                        "200": json_response("One page of loans", page_of("LoanView")),
                        "403": error_response("Missing catalog.can_see_borrowed")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "HomeStats": {
                    "type": "object",
                    "properties": {
                        "num_books": { "type": "integer" },
                        "num_instances": { "type": "integer" },
                        "num_instances_available": { "type": "integer" },
                        "num_authors": { "type": "integer" },
                        "genre_contains": { "type": "string" },
                        "num_genres_particular_word": { "type": "integer" },
                        "title_contains": { "type": "string" },
                        "num_books_particular_word": { "type": "integer" },
                        "num_visits": { "type": "integer" }
                    }
                },
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": ["integer", "null"] },
                        "summary": { "type": "string" },
                        "isbn": { "type": "string", "description": "13 character ISBN" },
                        "genres": { "type": "array", "items": { "type": "integer" } },
                        "language": { "type": ["integer", "null"] }
                    },
                    "required": ["id", "title", "summary", "isbn", "genres"]
                },
                "BookForm": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "integer" },
                        "summary": { "type": "string", "maxLength": 1000 },
                        "isbn": { "type": "string", "maxLength": 13 },
                        "genres": { "type": "array", "items": { "type": "integer" } },
                        "language": { "type": "integer" }
                    },
                    "required": ["title", "summary", "isbn"]
                },
                "Author": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "first_name": { "type": "string" },
                        "last_name": { "type": "string" },
                        "date_of_birth": { "type": ["string", "null"], "format": "date" },
                        "date_of_death": { "type": ["string", "null"], "format": "date" }
                    },
                    "required": ["id", "first_name", "last_name"]
                },
                "AuthorForm": {
                    "type": "object",
                    "properties": {
                        "first_name": { "type": "string", "maxLength": 100 },
                        "last_name": { "type": "string", "maxLength": 100 },
                        "date_of_birth": { "type": "string", "format": "date" },
                        "date_of_death": { "type": "string", "format": "date" }
                    },
                    "required": ["first_name", "last_name"]
                },
                "LoanView": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "book_id": { "type": "integer" },
                        "book_title": { "type": "string" },
                        "imprint": { "type": "string" },
                        "status": {
                            "type": "string",
                            "enum": ["maintenance", "on_loan", "available", "reserved"]
                        },
                        "due_back": { "type": ["string", "null"], "format": "date" },
                        "borrower": { "type": ["string", "null"] },
                        "is_overdue": { "type": "boolean" }
                    }
                },
                "RenewalForm": {
                    "type": "object",
                    "properties": {
                        "due_back": {
                            "type": "string",
                            "format": "date",
                            "description": "Between today and four weeks ahead"
                        }
                    },
                    "required": ["due_back"]
                },
                "RenewalPage": {
                    "type": "object",
                    "properties": {
                        "book_instance": schema_ref("LoanView"),
                        "form": schema_ref("RenewalForm"),
                        "errors": {
                            "type": "object",
                            "additionalProperties": {
                                "type": "array",
                                "items": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_fragment_references_declared_schemas() {
        let spec = openapi();
        let schemas = spec["components"]["schemas"].as_object().unwrap();
        let text = spec["paths"].to_string();
        for name in ["HomeStats", "Book", "Author", "LoanView", "RenewalPage"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
            assert!(text.contains(&format!("#/components/schemas/{name}")));
        }
    }

    #[tokio::test]
    async fn init_seeds_only_when_configured() {
        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };

        let quiet = CatalogModule::new(CatalogSettings::default());
        quiet.init(&ctx).await.unwrap();
        assert_eq!(quiet.store().counts("", "").await.books, 0);

        let seeded = CatalogModule::new(CatalogSettings {
            seed_demo_data: true,
            ..CatalogSettings::default()
        });
        seeded.init(&ctx).await.unwrap();
        assert!(seeded.store().counts("", "").await.books > 0);
    }
}
