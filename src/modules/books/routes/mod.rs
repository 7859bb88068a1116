//! HTTP handlers for the books module, mounted under `/api/books`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use library_http::error::AppError;

use super::filter::PriceRange;
use super::models::{Book, CreateBook, InventoryStats};
use super::repository::{BookRepository, RepositoryError, SearchCriteria};

pub type SharedRepository = Arc<dyn BookRepository>;

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::InvalidIdentifier(e) => {
                AppError::bad_request("invalid_identifier", e.to_string())
            }
            RepositoryError::NotFound(id) => AppError::not_found(format!("book '{}' not found", id)),
            RepositoryError::Persistence(e) => {
                AppError::Internal(anyhow::Error::new(e).context("book storage failure"))
            }
        }
    }
}

/// Routes of the books module, bound to `repository`
pub fn router(repository: SharedRepository) -> Router {
    Router::new()
        .route("/", put(create_book))
        .route("/health", get(health_check))
        .route("/search", get(search_books))
        .route("/store", get(inventory))
        .route(
            "/{id}",
            get(fetch_book).post(rename_book).delete(delete_book),
        )
        .with_state(repository)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn create_book(
    State(repository): State<SharedRepository>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::bad_request("invalid_body", rejection.body_text()))?;

    let book = request.validate().map_err(|errors| {
        let details = errors.iter().map(|e| json!(e)).collect();
        AppError::validation(details, "book is missing required fields or has invalid values")
    })?;

    let id = repository.create(book).await?;
    tracing::info!(book_id = %id, "book created");

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
struct RenameParams {
    title: Option<String>,
}

async fn rename_book(
    State(repository): State<SharedRepository>,
    Path(id): Path<String>,
    Query(params): Query<RenameParams>,
) -> Result<Json<Value>, AppError> {
    let title = match params.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => {
            return Err(AppError::validation(
                vec![json!({"field": "title", "error": "required"})],
                "a non-empty title query parameter is required",
            ))
        }
    };

    repository.rename(&id, &title).await?;
    tracing::info!(book_id = %id, "book renamed");

    Ok(Json(json!({ "id": id, "title": title })))
}

async fn fetch_book(
    State(repository): State<SharedRepository>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(repository.fetch(&id).await?))
}

async fn delete_book(
    State(repository): State<SharedRepository>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    repository.delete(&id).await?;
    tracing::info!(book_id = %id, "book deleted");

    Ok(Json(json!({ "id": id })))
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    title: Option<String>,
    author_name: Option<String>,
    /// `"<min>-<max>"`
    price_range: Option<String>,
}

impl SearchParams {
    fn into_criteria(self) -> SearchCriteria {
        let range = PriceRange::from_query(self.price_range.as_deref());
        SearchCriteria {
            title: self.title,
            author_name: self.author_name,
            price_min: Some(range.min),
            price_max: Some(range.max),
        }
    }
}

async fn search_books(
    State(repository): State<SharedRepository>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(repository.search(params.into_criteria()).await?))
}

async fn inventory(
    State(repository): State<SharedRepository>,
) -> Result<Json<InventoryStats>, AppError> {
    Ok(Json(repository.aggregate().await?))
}
