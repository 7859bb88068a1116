//! Book identifiers: external string form <-> stored record key.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when an external identifier is not a well-formed book id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid book identifier '{0}'")]
pub struct InvalidIdentifier(pub String);

/// Identifier of a persisted book.
///
/// Externally a lowercase hyphenated UUID; the same string is the key of the
/// `book` record in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookId(Uuid);

impl BookId {
    /// A fresh, time-ordered identifier. Only the repository's create path calls this.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Decode an external identifier.
    pub fn decode(external: &str) -> Result<Self, InvalidIdentifier> {
        Uuid::try_parse(external)
            .map(Self)
            .map_err(|_| InvalidIdentifier(external.to_string()))
    }

    /// Encode to the canonical external form.
    pub fn encode(&self) -> String {
        self.0.as_hyphenated().to_string()
    }

    /// Key of the stored record.
    pub fn record_key(&self) -> String {
        self.encode()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.0.as_hyphenated(), f)
    }
}

impl TryFrom<String> for BookId {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_encode_round_trip() {
        let id = BookId::generate();
        assert_eq!(BookId::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn round_trip_is_stable_for_alternate_spellings() {
        for external in [
            "0190b5c4-3d1e-7a2b-8c9d-0123456789ab",
            "0190B5C4-3D1E-7A2B-8C9D-0123456789AB",
            "0190b5c43d1e7a2b8c9d0123456789ab",
        ] {
            let decoded = BookId::decode(external).unwrap();
            assert_eq!(BookId::decode(&decoded.encode()).unwrap(), decoded);
            assert_eq!(decoded.encode(), "0190b5c4-3d1e-7a2b-8c9d-0123456789ab");
        }
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        for external in [
            "not-a-valid-id",
            "",
            "0190b5c4-3d1e-7a2b-8c9d-0123456789a",
            "0190b5c4-3d1e-7a2b-8c9d-0123456789abc",
            "zz90b5c4-3d1e-7a2b-8c9d-0123456789ab",
            "64b7f0c2a1e4d2f5c8a9b0c1",
            " 0190b5c4-3d1e-7a2b-8c9d-0123456789ab",
        ] {
            assert_eq!(
                BookId::decode(external),
                Err(InvalidIdentifier(external.to_string())),
                "{external:?} should be rejected"
            );
        }
    }

    #[test]
    fn generated_ids_are_distinct_v7() {
        let first = BookId::generate();
        let second = BookId::generate();
        assert_ne!(first, second);
        assert_eq!(first.0.get_version_num(), 7);
    }

    #[test]
    fn serializes_as_external_string() {
        let id = BookId::decode("0190b5c4-3d1e-7a2b-8c9d-0123456789ab").unwrap();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, "0190b5c4-3d1e-7a2b-8c9d-0123456789ab");
        assert!(serde_json::from_value::<BookId>(serde_json::json!("nope")).is_err());
    }
}
