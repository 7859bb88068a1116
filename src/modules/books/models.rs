use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::id::BookId;

pub const TITLE_FIELD: &str = "title";
pub const AUTHOR_NAME_FIELD: &str = "author_name";
pub const PRICE_FIELD: &str = "price";

/// A persisted book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier, assigned at creation
    pub id: BookId,
    pub title: String,
    pub author_name: String,
    pub price: f64,
    pub ebook_available: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub publish_date: OffsetDateTime,
}

/// A validated book that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author_name: String,
    pub price: f64,
    pub ebook_available: bool,
    pub publish_date: OffsetDateTime,
}

impl NewBook {
    pub fn into_book(self, id: BookId) -> Book {
        Book {
            id,
            title: self.title,
            author_name: self.author_name,
            price: self.price,
            ebook_available: self.ebook_available,
            publish_date: self.publish_date,
        }
    }
}

/// Request body for creating a book. Every field except
/// `ebook_available` is required; absence is reported per field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub ebook_available: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish_date: Option<OffsetDateTime>,
}

/// One rejected field of a [`CreateBook`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

impl FieldError {
    const fn new(field: &'static str, error: &'static str) -> Self {
        Self { field, error }
    }
}

impl CreateBook {
    /// Check required fields and value constraints.
    pub fn validate(self) -> Result<NewBook, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = required_text(self.title, TITLE_FIELD, &mut errors);
        let author_name = required_text(self.author_name, AUTHOR_NAME_FIELD, &mut errors);

        let price = match self.price {
            None => {
                errors.push(FieldError::new(PRICE_FIELD, "required"));
                None
            }
            Some(price) if !price.is_finite() || price < 0.0 => {
                errors.push(FieldError::new(PRICE_FIELD, "must be a non-negative number"));
                None
            }
            Some(price) => Some(price),
        };

        let publish_date = match self.publish_date {
            None => {
                errors.push(FieldError::new("publish_date", "required"));
                None
            }
            // RFC 3339 only covers four-digit years
            Some(date) if !(0..=9999).contains(&date.year()) => {
                errors.push(FieldError::new("publish_date", "year must be between 0 and 9999"));
                None
            }
            Some(date) => Some(date),
        };

        match (title, author_name, price, publish_date) {
            (Some(title), Some(author_name), Some(price), Some(publish_date)) => Ok(NewBook {
                title,
                author_name,
                price,
                ebook_available: self.ebook_available,
                publish_date,
            }),
            _ => Err(errors),
        }
    }
}

fn required_text(
    value: Option<String>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        None => {
            errors.push(FieldError::new(field, "required"));
            None
        }
        Some(text) if text.trim().is_empty() => {
            errors.push(FieldError::new(field, "must not be empty"));
            None
        }
        Some(text) => Some(text),
    }
}

/// Catalog-wide counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub distinct_authors: u64,
    /// May be an estimate on large collections.
    #[serde(rename = "books")]
    pub total_books: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn dune() -> CreateBook {
        CreateBook {
            title: Some("Dune".into()),
            author_name: Some("Herbert".into()),
            price: Some(15.5),
            ebook_available: true,
            publish_date: Some(datetime!(1965-01-01 00:00 UTC)),
        }
    }

    #[test]
    fn complete_request_validates() {
        let book = dune().validate().unwrap();
        assert_eq!(book.title, "Dune");
        assert!(book.ebook_available);
    }

    #[test]
    fn missing_fields_are_reported_individually() {
        let errors = CreateBook::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "author_name", "price", "publish_date"]);
        assert!(errors.iter().all(|e| e.error == "required"));
    }

    #[test]
    fn negative_price_and_blank_title_are_rejected() {
        let request = CreateBook {
            title: Some("  ".into()),
            price: Some(-1.0),
            ..dune()
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                FieldError::new("title", "must not be empty"),
                FieldError::new("price", "must be a non-negative number"),
            ]
        );
    }

    #[test]
    fn ebook_flag_defaults_to_false() {
        let request: CreateBook = serde_json::from_value(serde_json::json!({
            "title": "Emma",
            "author_name": "Austen",
            "price": 9,
            "publish_date": "1815-12-23T00:00:00Z"
        }))
        .unwrap();
        let book = request.validate().unwrap();
        assert!(!book.ebook_available);
        assert_eq!(book.price, 9.0);
        assert_eq!(book.publish_date, datetime!(1815-12-23 00:00 UTC));
    }

    #[test]
    fn book_serializes_with_external_keys() {
        let id = BookId::decode("0190b5c4-3d1e-7a2b-8c9d-0123456789ab").unwrap();
        let book = dune().validate().unwrap().into_book(id);
        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            serde_json::json!({
                "id": "0190b5c4-3d1e-7a2b-8c9d-0123456789ab",
                "title": "Dune",
                "author_name": "Herbert",
                "price": 15.5,
                "ebook_available": true,
                "publish_date": "1965-01-01T00:00:00Z"
            })
        );
    }
}
