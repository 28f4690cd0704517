//! World seed binding.
//!
//! A world is identified by a free-form seed phrase. The phrase is hashed once
//! with blake3 so every derived seed is stable across platforms and builds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed phrase plus its stable 256-bit digest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSeed {
    phrase: String,
    digest: [u8; 32],
}

impl WorldSeed {
    /// Bind a seed phrase.
    pub fn from_phrase(phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        let digest = *blake3::hash(phrase.as_bytes()).as_bytes();
        Self { phrase, digest }
    }

    /// 32-bit seed for noise permutation tables.
    fn as_u32(&self) -> u32 {
        u32::from_le_bytes([self.digest[0], self.digest[1], self.digest[2], self.digest[3]])
    }

    /// Derive an independent sub-seed for a named stream (e.g. a second noise layer).
    pub fn derive_u32(&self, domain: &str) -> u32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.digest);
        hasher.update(domain.as_bytes());
        let out = hasher.finalize();
        let bytes = out.as_bytes();
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl fmt::Debug for WorldSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldSeed")
            .field("phrase", &self.phrase)
            .field("u32", &self.as_u32())
            .finish()
    }
}

impl fmt::Display for WorldSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_phrase_same_seed() {
        let a = WorldSeed::from_phrase("canyon-run");
        let b = WorldSeed::from_phrase("canyon-run");
        assert_eq!(a, b);
        assert_eq!(a.as_u32(), b.as_u32());
    }

    #[test]
    fn different_phrases_differ() {
        let a = WorldSeed::from_phrase("alpha");
        let b = WorldSeed::from_phrase("beta");
        assert_ne!(a, b);
        assert_ne!(a.derive_u32("simplex"), b.derive_u32("simplex"));
    }

    #[test]
    fn derived_domains_are_independent() {
        let seed = WorldSeed::from_phrase("alpha");
        assert_ne!(seed.derive_u32("simplex"), seed.derive_u32("detail"));
        assert_eq!(seed.derive_u32("simplex"), seed.derive_u32("simplex"));
    }

    #[test]
    fn display_shows_phrase() {
        let seed = WorldSeed::from_phrase("dunes");
        assert_eq!(seed.to_string(), "dunes");
    }
}
