//! Content hashing
//!
//! Provides [`ContentHash`], a Blake3 digest of raw file text used to key
//! parsed-table caches and to detect whether a write changed anything.

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get reference to the underlying bytes
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

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_hash() {
        let a = ContentHash::compute(b"Author\nalice");
        let b = ContentHash::compute(b"Author\nalice");
        let c = ContentHash::compute(b"Author\nbob");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_hex() {
        let h = ContentHash::compute(b"x");
        assert_eq!(h.to_string().len(), 64);
        assert_eq!(h.short().len(), 16);
        assert!(h.to_string().starts_with(&h.short()));
    }
}
