use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when an identifier cannot be parsed from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct IdParseError {
    /// Which identifier was being parsed (e.g. "user ID").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier, trimming surrounding whitespace.
            pub fn parse(input: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(input.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        value: input.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identity of a shopper. Resolved by the authentication layer before
    /// a request reaches the workflow.
    UserId,
    "user ID"
);

uuid_id!(
    /// Identity of a product; keys the stock ledger and cart lines.
    ProductId,
    "product ID"
);

uuid_id!(
    /// Generated identity of a single history entry.
    EntryId,
    "entry ID"
);

uuid_id!(
    /// Shared by every history entry written by one confirmation.
    ///
    /// This is a grouping key, not a storage transaction.
    TransactionId,
    "transaction ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(TransactionId::new(), TransactionId::new());
    }

    #[test]
    fn parse_accepts_hyphenated_uuid() {
        let uuid = Uuid::new_v4();
        let id = ProductId::parse(&uuid.to_string()).unwrap();
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn parse_trims_whitespace() {
        let uuid = Uuid::new_v4();
        let id: UserId = format!("  {uuid} ").parse().unwrap();
        assert_eq!(id, UserId::from_uuid(uuid));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        let err = UserId::parse("not-a-user").unwrap_err();
        assert_eq!(err.kind, "user ID");
        assert_eq!(err.value, "not-a-user");
        assert_eq!(err.to_string(), "invalid user ID: \"not-a-user\"");
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = EntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
