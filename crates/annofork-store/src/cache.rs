//! Content-addressed table cache using moka
//!
//! Parsing a large trajectory file on every view is wasteful; the cache keys
//! parse results by the Blake3 hash of the raw text plus the parse mode, so a
//! file that has not changed on disk is never re-parsed.

use annofork_table::{parse, ContentHash, ParseError, ParseMode, Parsed};
use moka::future::Cache;
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Parsed tables by content hash
#[derive(Debug, Clone)]
pub struct TableCache {
    inner: Cache<(ContentHash, ParseMode), Arc<Parsed>>,
}

impl TableCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Parse `text`, reusing an earlier result for identical text
    ///
    /// # Errors
    /// Whatever [`annofork_table::parse`] reports; failures are not cached
    pub async fn parse(&self, text: &str, mode: ParseMode) -> Result<Parsed, ParseError> {
        let key = (ContentHash::compute(text.as_bytes()), mode);
        if let Some(hit) = self.inner.get(&key).await {
            return Ok((*hit).clone());
        }
        let parsed = parse(text, mode)?;
        self.inner.insert(key, Arc::new(parsed.clone())).await;
        Ok(parsed)
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_hits_cache() {
        let cache = TableCache::new(16);
        let a = cache.parse("Author\nalice", ParseMode::Literal).await.unwrap();
        let b = cache.parse("Author\nalice", ParseMode::Literal).await.unwrap();
        assert_eq!(a, b);
        cache.inner.run_pending_tasks().await;
        assert_eq!(cache.stats().entry_count, 1);
    }

    #[tokio::test]
    async fn mode_is_part_of_key() {
        let cache = TableCache::new(16);
        let literal = cache.parse("n\n10", ParseMode::Literal).await.unwrap();
        let typed = cache.parse("n\n10", ParseMode::Typed).await.unwrap();
        assert_ne!(literal.table, typed.table);
    }

    #[tokio::test]
    async fn errors_propagate() {
        let cache = TableCache::new(16);
        assert!(cache.parse("\"open", ParseMode::Literal).await.is_err());
    }
}
