pub mod filter;
pub mod id;
pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use serde_json::json;

use library_kernel::{settings::DatabaseSettings, Db, InitCtx, Migration, Module};

pub use id::{BookId, InvalidIdentifier};
pub use repository::{BookRepository, RepositoryError, SearchCriteria, SurrealBookRepository};
use routes::SharedRepository;

/// Schema of the `book` table
pub fn schema_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_init",
            up: r#"
                DEFINE TABLE book SCHEMAFULL;
                DEFINE FIELD title           ON book TYPE string ASSERT $value != "";
                DEFINE FIELD author_name     ON book TYPE string ASSERT $value != "";
                DEFINE FIELD price           ON book TYPE number ASSERT $value >= 0;
                DEFINE FIELD ebook_available ON book TYPE bool DEFAULT false;
                DEFINE FIELD publish_date    ON book TYPE string ASSERT $value != "";
                "#,
        },
        Migration {
            id: "002_search_indexes",
            up: r#"
                DEFINE INDEX book_title       ON book FIELDS title;
                DEFINE INDEX book_author_name ON book FIELDS author_name;
                "#,
        },
    ]
}

/// Book catalog module
pub struct BooksModule {
    repository: SharedRepository,
}

impl BooksModule {
    pub fn new(repository: SharedRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.repository.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        schema_migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let stats = self
            .repository
            .aggregate()
            .await
            .context("failed to read catalog statistics")?;
        tracing::info!(
            module = self.name(),
            books = stats.total_books,
            distinct_authors = stats.distinct_authors,
            "books module started"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });

    json!({
        "paths": {
            "/": {
                "put": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CreateBook" }
                            }
                        }
                    },
                    "responses": {
                        "201": json_response("Book created", json!({
                            "type": "object",
                            "properties": { "id": { "type": "string" } }
                        })),
                        "400": error_response("Missing or invalid fields"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Fetch a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("The book", book_ref.clone()),
                        "400": error_response("Malformed identifier"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Rename a book",
                    "tags": ["Books"],
                    "parameters": [
                        id_parameter(),
                        {
                            "name": "title",
                            "in": "query",
                            "required": true,
                            "schema": { "type": "string" }
                        }
                    ],
                    "responses": {
                        "200": json_response("Book renamed", json!({ "type": "object" })),
                        "400": error_response("Malformed identifier or missing title"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("Book deleted", json!({ "type": "object" })),
                        "400": error_response("Malformed identifier"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/search": {
                "get": {
                    "summary": "Search books",
                    "tags": ["Books"],
                    "parameters": [
                        { "name": "title", "in": "query", "schema": { "type": "string" } },
                        { "name": "author_name", "in": "query", "schema": { "type": "string" } },
                        {
                            "name": "price_range",
                            "in": "query",
                            "description": "Inclusive range as <min>-<max>",
                            "schema": { "type": "string" }
                        }
                    ],
                    "responses": {
                        "200": json_response("Matching books", json!({
                            "type": "array",
                            "items": book_ref
                        })),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/store": {
                "get": {
                    "summary": "Catalog statistics",
                    "tags": ["Books"],
                    "responses": {
                        "200": json_response("Distinct authors and (approximate) book count", json!({
                            "$ref": "#/components/schemas/InventoryStats"
                        })),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "title": { "type": "string" },
                        "author_name": { "type": "string" },
                        "price": { "type": "number", "minimum": 0 },
                        "ebook_available": { "type": "boolean" },
                        "publish_date": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author_name", "price", "ebook_available", "publish_date"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author_name": { "type": "string" },
                        "price": { "type": "number", "minimum": 0 },
                        "ebook_available": { "type": "boolean", "default": false },
                        "publish_date": { "type": "string", "format": "date-time" }
                    },
                    "required": ["title", "author_name", "price", "publish_date"]
                },
                "InventoryStats": {
                    "type": "object",
                    "properties": {
                        "distinct_authors": { "type": "integer" },
                        "books": { "type": "integer" }
                    },
                    "required": ["distinct_authors", "books"]
                }
            }
        }
    })
}

/// Create the books module over the shared database handle
pub fn create_module(db: Db, settings: &DatabaseSettings) -> Arc<dyn Module> {
    let repository = SurrealBookRepository::new(db, settings.operation_timeout());
    Arc::new(BooksModule::new(Arc::new(repository)))
}
