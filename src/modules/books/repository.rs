//! Data access for the `book` table.
//!
//! Every operation returns domain values and one of three failure kinds:
//! a malformed identifier, a well-formed identifier with no matching record,
//! or a storage failure (database error, timeout, undecodable record).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

use library_kernel::Db;

use super::filter::{BookFilter, PriceRange};
use super::id::{BookId, InvalidIdentifier};
use super::models::{Book, InventoryStats, NewBook, AUTHOR_NAME_FIELD, TITLE_FIELD};

pub const BOOK_TABLE: &str = "book";

const BOOK_PROJECTION: &str =
    "record::id(id) AS key, title, author_name, price, ebook_available, publish_date";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    #[error("book '{0}' not found")]
    NotFound(BookId),

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("malformed book record: {0}")]
    Malformed(String),
}

impl From<surrealdb::Error> for RepositoryError {
    fn from(e: surrealdb::Error) -> Self {
        Self::Persistence(PersistenceError::Database(e))
    }
}

/// Optional search criteria as received from callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

impl SearchCriteria {
    /// The price range is always applied; missing bounds take the sentinels.
    pub fn to_filter(&self) -> BookFilter {
        let range = PriceRange::resolve(self.price_min, self.price_max);
        BookFilter::build(
            self.title.as_deref(),
            self.author_name.as_deref(),
            Some(range.min),
            Some(range.max),
        )
    }
}

/// Book storage operations.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Persist a new book and return its freshly assigned identifier.
    async fn create(&self, book: NewBook) -> Result<BookId, RepositoryError>;

    /// Replace the title of an existing book. Never inserts.
    ///
    /// `title` must be non-empty; the stored schema rejects an empty title
    /// and the rejection surfaces as [`RepositoryError::Persistence`].
    async fn rename(&self, id: &str, title: &str) -> Result<(), RepositoryError>;

    async fn fetch(&self, id: &str) -> Result<Book, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// All books matching the criteria, ordered by title then id. An empty
    /// result is not an error.
    async fn search(&self, criteria: SearchCriteria) -> Result<Vec<Book>, RepositoryError>;

    /// Distinct author count and total book count. The total may be an
    /// estimate; callers must not rely on it being exact.
    async fn aggregate(&self) -> Result<InventoryStats, RepositoryError>;
}

/// Stored shape of a book, without its record id.
#[derive(Debug, Serialize)]
struct BookDocument {
    title: String,
    author_name: String,
    price: f64,
    ebook_available: bool,
    publish_date: String,
}

impl TryFrom<NewBook> for BookDocument {
    type Error = PersistenceError;

    fn try_from(book: NewBook) -> Result<Self, Self::Error> {
        // Stored in UTC so lexical order matches chronological order
        let publish_date = book
            .publish_date
            .to_offset(UtcOffset::UTC)
            .format(&Rfc3339)
            .map_err(|e| PersistenceError::Malformed(format!("publish_date: {}", e)))?;

        Ok(Self {
            title: book.title,
            author_name: book.author_name,
            price: book.price,
            ebook_available: book.ebook_available,
            publish_date,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BookRow {
    key: String,
    title: String,
    author_name: String,
    price: f64,
    #[serde(default)]
    ebook_available: bool,
    publish_date: String,
}

impl TryFrom<BookRow> for Book {
    type Error = PersistenceError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let id = BookId::decode(&row.key).map_err(|e| PersistenceError::Malformed(e.to_string()))?;
        let publish_date = OffsetDateTime::parse(&row.publish_date, &Rfc3339).map_err(|e| {
            PersistenceError::Malformed(format!("publish_date of book '{}': {}", id, e))
        })?;

        Ok(Book {
            id,
            title: row.title,
            author_name: row.author_name,
            price: row.price,
            ebook_available: row.ebook_available,
            publish_date,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    #[allow(dead_code)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct AuthorRow {
    #[allow(dead_code)]
    author_name: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

/// [`BookRepository`] backed by SurrealDB.
#[derive(Clone)]
pub struct SurrealBookRepository {
    db: Db,
    timeout: Duration,
}

impl SurrealBookRepository {
    /// `timeout` bounds every single operation.
    pub fn new(db: Db, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "book repository operation timed out"
                );
                Err(PersistenceError::Timeout {
                    operation,
                    timeout: self.timeout,
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl BookRepository for SurrealBookRepository {
    async fn create(&self, book: NewBook) -> Result<BookId, RepositoryError> {
        let id = BookId::generate();
        let document = BookDocument::try_from(book)?;

        self.bounded("create", async {
            self.db
                .query("CREATE type::thing($table, $key) CONTENT $document RETURN NONE")
                .bind(("table", BOOK_TABLE))
                .bind(("key", id.record_key()))
                .bind(("document", document))
                .await?
                .check()?;
            Ok::<_, RepositoryError>(())
        })
        .await?;

        tracing::debug!(book_id = %id, "book created");
        Ok(id)
    }

    async fn rename(&self, id: &str, title: &str) -> Result<(), RepositoryError> {
        let id = BookId::decode(id)?;
        let title = title.to_string();

        let updated: Vec<TitleRow> = self
            .bounded("rename", async {
                // UPDATE on a record id only touches existing records
                let rows = self
                    .db
                    .query(format!(
                        "UPDATE type::thing($table, $key) SET {TITLE_FIELD} = $title RETURN {TITLE_FIELD}"
                    ))
                    .bind(("table", BOOK_TABLE))
                    .bind(("key", id.record_key()))
                    .bind(("title", title))
                    .await?
                    .take(0)?;
                Ok::<_, RepositoryError>(rows)
            })
            .await?;

        if updated.is_empty() {
            return Err(RepositoryError::NotFound(id));
        }
        tracing::debug!(book_id = %id, "book renamed");
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Book, RepositoryError> {
        let id = BookId::decode(id)?;

        let row: Option<BookRow> = self
            .bounded("fetch", async {
                let row = self
                    .db
                    .query(format!(
                        "SELECT {BOOK_PROJECTION} FROM type::thing($table, $key)"
                    ))
                    .bind(("table", BOOK_TABLE))
                    .bind(("key", id.record_key()))
                    .await?
                    .take(0)?;
                Ok::<_, RepositoryError>(row)
            })
            .await?;

        match row {
            Some(row) => Ok(Book::try_from(row)?),
            None => Err(RepositoryError::NotFound(id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let id = BookId::decode(id)?;

        let removed: Vec<TitleRow> = self
            .bounded("delete", async {
                let rows = self
                    .db
                    .query("DELETE type::thing($table, $key) RETURN BEFORE")
                    .bind(("table", BOOK_TABLE))
                    .bind(("key", id.record_key()))
                    .await?
                    .take(0)?;
                Ok::<_, RepositoryError>(rows)
            })
            .await?;

        if removed.is_empty() {
            return Err(RepositoryError::NotFound(id));
        }
        tracing::debug!(book_id = %id, "book deleted");
        Ok(())
    }

    async fn search(&self, criteria: SearchCriteria) -> Result<Vec<Book>, RepositoryError> {
        let filter = criteria.to_filter();
        let sql = format!(
            "SELECT {BOOK_PROJECTION} FROM {BOOK_TABLE} WHERE {} ORDER BY title, key",
            filter.condition()
        );

        let rows: Vec<BookRow> = self
            .bounded("search", async {
                let mut query = self.db.query(sql);
                for binding in filter.bindings() {
                    query = query.bind(binding);
                }
                let rows = query.await?.take(0)?;
                Ok::<_, RepositoryError>(rows)
            })
            .await?;

        tracing::debug!(matches = rows.len(), "book search completed");
        rows.into_iter()
            .map(|row| Book::try_from(row).map_err(RepositoryError::from))
            .collect()
    }

    async fn aggregate(&self) -> Result<InventoryStats, RepositoryError> {
        let condition = BookFilter::all().condition();
        let sql = format!(
            "SELECT {AUTHOR_NAME_FIELD} FROM {BOOK_TABLE} WHERE {condition} GROUP BY {AUTHOR_NAME_FIELD};
             SELECT count() AS total FROM {BOOK_TABLE} WHERE {condition} GROUP ALL;"
        );

        let (authors, total) = self
            .bounded("aggregate", async {
                let mut response = self.db.query(sql).await?;
                let authors: Vec<AuthorRow> = response.take(0)?;
                let total: Option<CountRow> = response.take(1)?;
                Ok::<_, RepositoryError>((authors, total))
            })
            .await?;

        Ok(InventoryStats {
            distinct_authors: authors.len() as u64,
            total_books: total.map_or(0, |row| row.total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::filter::{Binding, PRICE_MAX, PRICE_MIN};
    use crate::modules::books::schema_migrations;
    use library_kernel::settings::DatabaseSettings;
    use time::macros::datetime;

    async fn repository() -> SurrealBookRepository {
        let db = library_db::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        let migrations: Vec<_> = schema_migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        library_db::apply_migrations(&db, &migrations).await.unwrap();
        SurrealBookRepository::new(db, Duration::from_secs(10))
    }

    fn new_book(title: &str, author_name: &str, price: f64) -> NewBook {
        NewBook {
            title: title.to_string(),
            author_name: author_name.to_string(),
            price,
            ebook_available: false,
            publish_date: datetime!(2000-01-01 00:00 UTC),
        }
    }

    fn dune() -> NewBook {
        NewBook {
            title: "Dune".to_string(),
            author_name: "Herbert".to_string(),
            price: 15.5,
            ebook_available: true,
            publish_date: datetime!(1965-01-01 00:00 UTC),
        }
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips_all_fields() {
        let repo = repository().await;
        let id = repo.create(dune()).await.unwrap();

        let book = repo.fetch(&id.encode()).await.unwrap();
        assert_eq!(book, dune().into_book(id));
    }

    #[tokio::test]
    async fn publish_date_offset_is_normalized_to_utc() {
        let repo = repository().await;
        let book = NewBook {
            publish_date: datetime!(1965-01-01 02:00 +02:00),
            ..dune()
        };
        let id = repo.create(book).await.unwrap();

        let fetched = repo.fetch(&id.encode()).await.unwrap();
        assert_eq!(fetched.publish_date, datetime!(1965-01-01 00:00 UTC));
        assert_eq!(fetched.publish_date.offset(), UtcOffset::UTC);
    }

    #[tokio::test]
    async fn fetch_of_unknown_id_is_not_found() {
        let repo = repository().await;
        let missing = BookId::generate();

        match repo.fetch(&missing.encode()).await {
            Err(RepositoryError::NotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_querying() {
        let repo = repository().await;

        assert!(matches!(
            repo.fetch("not-a-valid-id").await,
            Err(RepositoryError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            repo.rename("not-a-valid-id", "x").await,
            Err(RepositoryError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            repo.delete("not-a-valid-id").await,
            Err(RepositoryError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn rename_replaces_only_the_title() {
        let repo = repository().await;
        let id = repo.create(dune()).await.unwrap();

        repo.rename(&id.encode(), "Dune Messiah").await.unwrap();

        let book = repo.fetch(&id.encode()).await.unwrap();
        assert_eq!(
            book,
            Book {
                title: "Dune Messiah".to_string(),
                ..dune().into_book(id)
            }
        );
    }

    #[tokio::test]
    async fn rename_of_unknown_id_is_not_found_and_inserts_nothing() {
        let repo = repository().await;
        let missing = BookId::generate();

        assert!(matches!(
            repo.rename(&missing.encode(), "Ghost").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.fetch(&missing.encode()).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert_eq!(repo.aggregate().await.unwrap().total_books, 0);
    }

    #[tokio::test]
    async fn rename_to_empty_title_is_rejected_by_schema() {
        let repo = repository().await;
        let id = repo.create(dune()).await.unwrap();

        assert!(matches!(
            repo.rename(&id.encode(), "").await,
            Err(RepositoryError::Persistence(PersistenceError::Database(_)))
        ));
        assert_eq!(repo.fetch(&id.encode()).await.unwrap().title, "Dune");
    }

    #[tokio::test]
    async fn delete_then_fetch_is_not_found() {
        let repo = repository().await;
        let id = repo.create(dune()).await.unwrap();

        repo.delete(&id.encode()).await.unwrap();

        assert!(matches!(
            repo.fetch(&id.encode()).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(&id.encode()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_by_title_returns_exactly_the_match() {
        let repo = repository().await;
        let dune_id = repo.create(dune()).await.unwrap();
        repo.create(new_book("Emma", "Austen", 9.99)).await.unwrap();
        repo.create(new_book("Ulysses", "Joyce", 20.01)).await.unwrap();

        let found = repo
            .search(SearchCriteria {
                title: Some("Dune".to_string()),
                author_name: Some(String::new()),
                price_min: Some(0.0),
                price_max: Some(1_000_000.0),
            })
            .await
            .unwrap();

        assert_eq!(found, vec![dune().into_book(dune_id)]);
    }

    #[tokio::test]
    async fn search_price_range_is_inclusive() {
        let repo = repository().await;
        for (title, price) in [("A", 9.99), ("B", 10.0), ("C", 15.0), ("D", 20.0), ("E", 20.01)] {
            repo.create(new_book(title, "Author", price)).await.unwrap();
        }

        let found = repo
            .search(SearchCriteria {
                price_min: Some(10.0),
                price_max: Some(20.0),
                ..SearchCriteria::default()
            })
            .await
            .unwrap();

        let titles: Vec<&str> = found.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "D"]);
    }

    #[tokio::test]
    async fn search_without_matches_is_empty_not_error() {
        let repo = repository().await;
        repo.create(dune()).await.unwrap();

        let found = repo
            .search(SearchCriteria {
                author_name: Some("Tolkien".to_string()),
                ..SearchCriteria::default()
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn search_without_criteria_returns_everything_ordered_by_title() {
        let repo = repository().await;
        repo.create(new_book("Ulysses", "Joyce", 20.01)).await.unwrap();
        repo.create(dune()).await.unwrap();
        repo.create(new_book("Emma", "Austen", 9.99)).await.unwrap();

        let found = repo.search(SearchCriteria::default()).await.unwrap();
        let titles: Vec<&str> = found.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dune", "Emma", "Ulysses"]);
    }

    #[tokio::test]
    async fn aggregate_counts_distinct_authors_and_books() {
        let repo = repository().await;
        assert_eq!(
            repo.aggregate().await.unwrap(),
            InventoryStats {
                distinct_authors: 0,
                total_books: 0
            }
        );

        repo.create(dune()).await.unwrap();
        repo.create(new_book("Emma", "Austen", 9.99)).await.unwrap();
        assert_eq!(
            repo.aggregate().await.unwrap(),
            InventoryStats {
                distinct_authors: 2,
                total_books: 2
            }
        );

        repo.create(new_book("Persuasion", "Austen", 10.0))
            .await
            .unwrap();
        assert_eq!(
            repo.aggregate().await.unwrap(),
            InventoryStats {
                distinct_authors: 2,
                total_books: 3
            }
        );
    }

    #[tokio::test]
    async fn unconnected_backend_is_a_persistence_error() {
        let repo = SurrealBookRepository::new(Db::init(), Duration::from_secs(1));

        assert!(matches!(
            repo.fetch(&BookId::generate().encode()).await,
            Err(RepositoryError::Persistence(_))
        ));
        assert!(matches!(
            repo.create(dune()).await,
            Err(RepositoryError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn slow_operations_time_out_as_persistence_errors() {
        let repo = SurrealBookRepository::new(Db::init(), Duration::from_millis(10));

        let result: Result<(), _> = repo
            .bounded("fetch", std::future::pending::<Result<(), RepositoryError>>())
            .await;

        match result {
            Err(RepositoryError::Persistence(PersistenceError::Timeout { operation, .. })) => {
                assert_eq!(operation, "fetch")
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn criteria_always_apply_a_price_range() {
        let filter = SearchCriteria::default().to_filter();
        assert_eq!(
            filter.condition(),
            "price >= $price_min AND price <= $price_max"
        );
        assert_eq!(
            filter.bindings(),
            vec![
                ("price_min", Binding::Number(PRICE_MIN)),
                ("price_max", Binding::Number(PRICE_MAX)),
            ]
        );

        let filter = SearchCriteria {
            title: Some("Dune".to_string()),
            author_name: Some(String::new()),
            price_max: Some(20.0),
            ..SearchCriteria::default()
        }
        .to_filter();
        assert_eq!(
            filter.condition(),
            "title = $title AND price >= $price_min AND price <= $price_max"
        );
        assert_eq!(filter.bindings()[2], ("price_max", Binding::Number(20.0)));
    }
}
