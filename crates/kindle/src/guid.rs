//! # Guids — Stable Identifiers and Deterministic Providers
//!
//! Every scene node and component carries a [`Guid`]: a string identifier that
//! is independent of arena handles and survives the wire. Loaders may hand in
//! arbitrary guids; clones receive theirs from an [`IdProvider`].
//!
//! ## Determinism
//!
//! An [`IdProvider`] holds a seed and a counter. Each call to
//! [`IdProvider::next_guid`] hashes the current counter into a UUIDv5 and then
//! decrements it:
//!
//! ```text
//! seed 42 → uuid5("42"), uuid5("41"), uuid5("40"), ...
//! ```
//!
//! Two providers built from the same seed therefore produce the same
//! sequence, which is what lets a remote peer replay a clone and end up with
//! identical guids. String seeds are folded into a 32-bit number first.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace all provider-generated guids are derived in.
const GUID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_3a4e_8f20_4c57_9a0e_2d5f_71c8_b934);

/// Numeric seed for an [`IdProvider`].
pub type Seed = i64;

/// A stable, unique identifier for a node or component.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A fresh random guid (UUIDv4). Used for nodes and components created
    /// outside of an instantiation.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Deterministic guid generator.
#[derive(Debug, Clone)]
pub struct IdProvider {
    seed: Seed,
    original_seed: Seed,
}

impl IdProvider {
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            original_seed: seed,
        }
    }

    /// Build a provider from a string seed.
    pub fn from_str_seed(seed: &str) -> Self {
        Self::new(Self::hash(seed))
    }

    /// A provider with a random seed, for clones that are never replayed.
    pub fn random() -> Self {
        Self::new(Self::generate_seed())
    }

    /// A fresh seed for a replicated instantiation.
    pub fn generate_seed() -> Seed {
        Seed::from(rand::random::<u32>())
    }

    /// Fold a string into a 32-bit seed (`h = h * 31 + c`, wrapping).
    pub fn hash(value: &str) -> Seed {
        let mut hash: i32 = 0;
        for unit in value.encode_utf16() {
            hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
        }
        Seed::from(hash)
    }

    /// Produce the next guid in the sequence.
    pub fn next_guid(&mut self) -> Guid {
        let current = self.seed;
        self.seed = self.seed.wrapping_sub(1);
        Guid(Uuid::new_v5(&GUID_NAMESPACE, current.to_string().as_bytes()).to_string())
    }

    /// Rewind to the original seed.
    pub fn reset(&mut self) {
        self.seed = self.original_seed;
    }

    /// The seed this provider was built from.
    pub fn seed(&self) -> Seed {
        self.original_seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equal_seeds_equal_sequences() {
        let mut a = IdProvider::new(42);
        let mut b = IdProvider::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_guid(), b.next_guid());
        }
    }

    #[test]
    fn sequence_is_unique() {
        let mut provider = IdProvider::new(7);
        let guids: HashSet<_> = (0..256).map(|_| provider.next_guid()).collect();
        assert_eq!(guids.len(), 256);
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = IdProvider::new(1);
        let mut b = IdProvider::new(2);
        assert_ne!(a.next_guid(), b.next_guid());
    }

    #[test]
    fn reset_rewinds() {
        let mut provider = IdProvider::new(10);
        let first = provider.next_guid();
        provider.next_guid();
        provider.reset();
        assert_eq!(provider.next_guid(), first);
    }

    #[test]
    fn counter_decrements() {
        // Seed 42 followed by seed 41 must match a provider seeded at 41.
        let mut a = IdProvider::new(42);
        a.next_guid();
        let mut b = IdProvider::new(41);
        assert_eq!(a.next_guid(), b.next_guid());
    }

    #[test]
    fn string_seed_hash() {
        assert_eq!(IdProvider::hash(""), 0);
        assert_eq!(IdProvider::hash("a"), 97);
        assert_eq!(IdProvider::hash("ab"), 97 * 31 + 98);
        let mut a = IdProvider::from_str_seed("room-1");
        let mut b = IdProvider::from_str_seed("room-1");
        assert_eq!(a.next_guid(), b.next_guid());
    }

    #[test]
    fn guid_serializes_as_string() {
        let guid = Guid::new("abc");
        assert_eq!(serde_json::to_string(&guid).unwrap(), "\"abc\"");
    }
}
