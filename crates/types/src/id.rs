//! Opaque, stable entity identifiers.
//!
//! Internally a ULID (lexicographically sortable, good as a SQLite TEXT
//! primary key); at the wire boundary it is just an opaque string, per
//! spec.md §6: "the choice of integer or UUID is an implementation detail
//! and must not appear in wire contracts".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(ulid::Ulid);

impl Id {
    /// Generate a new, time-sortable identifier.
    pub fn new() -> Self {
        Id(ulid::Ulid::new())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Id(ulid::Ulid::from_str(s)?))
    }
}

impl From<ulid::Ulid> for Id {
    fn from(u: ulid::Ulid) -> Self {
        Id(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_string() {
        let id = Id::new();
        let s = id.to_string();
        let parsed: Id = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }
}
