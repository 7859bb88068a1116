//! Search predicates over the closed set of queryable book fields.
//!
//! A [`BookFilter`] renders to a parameterized SurrealQL condition: field
//! names come from this module, values are always bound, never interpolated.

use serde::Serialize;

use super::models::{AUTHOR_NAME_FIELD, PRICE_FIELD, TITLE_FIELD};

/// Lower sentinel applied when a search gives no usable minimum price.
pub const PRICE_MIN: f64 = 0.0;
/// Upper sentinel applied when a search gives no usable maximum price.
pub const PRICE_MAX: f64 = 1_000_000.0;

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Fill missing bounds with the sentinels.
    pub fn resolve(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(min.unwrap_or(PRICE_MIN), max.unwrap_or(PRICE_MAX))
    }

    /// Resolve the external `"<min>-<max>"` query parameter.
    ///
    /// Anything other than exactly two `-`-separated parts yields the full
    /// sentinel range; each unparsable side falls back to its own sentinel.
    pub fn from_query(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let parts: Vec<&str> = raw.split('-').collect();
        match parts.as_slice() {
            [min, max] => Self::resolve(parse_bound(min), parse_bound(max)),
            _ => Self::default(),
        }
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::new(PRICE_MIN, PRICE_MAX)
    }
}

fn parse_bound(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Value bound to a query parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Binding {
    Text(String),
    Number(f64),
}

/// Predicate over books. The default filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    title: Option<String>,
    author_name: Option<String>,
    price: Option<PriceRange>,
}

impl BookFilter {
    /// The universal filter.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    /// Build a filter from optional criteria.
    ///
    /// Empty strings impose no constraint. A range is applied as soon as one
    /// bound is given; the other side takes its sentinel.
    pub fn build(
        title: Option<&str>,
        author_name: Option<&str>,
        price_min: Option<f64>,
        price_max: Option<f64>,
    ) -> Self {
        let mut builder = Self::builder();
        if let Some(title) = title {
            builder = builder.title(title);
        }
        if let Some(author_name) = author_name {
            builder = builder.author_name(author_name);
        }
        if price_min.is_some() || price_max.is_some() {
            builder = builder.price_range(PriceRange::resolve(price_min, price_max));
        }
        builder.build()
    }

    /// SurrealQL condition for a `WHERE` clause; `true` when unconstrained.
    pub fn condition(&self) -> String {
        let mut clauses = Vec::new();
        if self.title.is_some() {
            clauses.push(format!("{TITLE_FIELD} = $title"));
        }
        if self.author_name.is_some() {
            clauses.push(format!("{AUTHOR_NAME_FIELD} = $author_name"));
        }
        if self.price.is_some() {
            clauses.push(format!("{PRICE_FIELD} >= $price_min"));
            clauses.push(format!("{PRICE_FIELD} <= $price_max"));
        }

        if clauses.is_empty() {
            "true".to_string()
        } else {
            clauses.join(" AND ")
        }
    }

    /// Parameters referenced by [`condition`](Self::condition), in clause order.
    pub fn bindings(&self) -> Vec<(&'static str, Binding)> {
        let mut bindings = Vec::new();
        if let Some(title) = &self.title {
            bindings.push(("title", Binding::Text(title.clone())));
        }
        if let Some(author_name) = &self.author_name {
            bindings.push(("author_name", Binding::Text(author_name.clone())));
        }
        if let Some(range) = self.price {
            bindings.push(("price_min", Binding::Number(range.min)));
            bindings.push(("price_max", Binding::Number(range.max)));
        }
        bindings
    }
}

/// Fluent construction of a [`BookFilter`].
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    filter: BookFilter,
}

impl FilterBuilder {
    /// Exact title match; an empty title is ignored.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.filter.title = non_empty(title.into());
        self
    }

    /// Exact author match; an empty name is ignored.
    pub fn author_name(mut self, author_name: impl Into<String>) -> Self {
        self.filter.author_name = non_empty(author_name.into());
        self
    }

    pub fn price_range(mut self, range: PriceRange) -> Self {
        self.filter.price = Some(range);
        self
    }

    pub fn build(self) -> BookFilter {
        self.filter
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
