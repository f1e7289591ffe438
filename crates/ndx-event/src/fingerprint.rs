//! Schema fingerprints for upstream records
//!
//! A fingerprint is the SHA-256 of the sorted, de-duplicated field names of a
//! record. Two records with the same fields produce the same fingerprint
//! regardless of field order or values.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// SHA-256 over sorted field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint([u8; 32]);

impl SchemaFingerprint {
    /// Compute the fingerprint of a set of field names
    #[must_use]
    pub fn of_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sorted: BTreeSet<&str> = fields.into_iter().collect();
        let mut hasher = Sha256::new();
        for field in sorted {
            hasher.update(field.as_bytes());
            hasher.update([0]);
        }
        Self(hasher.finalize().into())
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for SchemaFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for SchemaFingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for SchemaFingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SchemaFingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn order_does_not_matter() {
        let a = SchemaFingerprint::of_fields(["uuid", "userEmail", "status"]);
        let b = SchemaFingerprint::of_fields(["status", "uuid", "userEmail"]);
        assert_eq!(a, b);
    }

    #[test]
    fn added_field_changes_fingerprint() {
        let a = SchemaFingerprint::of_fields(["uuid", "userEmail"]);
        let b = SchemaFingerprint::of_fields(["uuid", "userEmail", "costReportGroup"]);
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = SchemaFingerprint::of_fields(["ab", "c"]);
        let b = SchemaFingerprint::of_fields(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn parses_from_hex() {
        let fp = SchemaFingerprint::of_fields(["uuid"]);
        let parsed: SchemaFingerprint = fp.to_string().parse().unwrap();
        assert_eq!(fp, parsed);
        assert_eq!(fp.short().len(), 16);
    }

    proptest! {
        #[test]
        fn prop_permutation_invariant(mut fields in proptest::collection::vec("[a-zA-Z]{1,12}", 1..12)) {
            let forward = SchemaFingerprint::of_fields(fields.iter().map(String::as_str));
            fields.reverse();
            let backward = SchemaFingerprint::of_fields(fields.iter().map(String::as_str));
            prop_assert_eq!(forward, backward);
        }
    }
}
