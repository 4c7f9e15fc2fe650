//! Rewrite cache.
//!
//! Shared between all connections opened from the same [`Database`].
//! Rewrites are rare relative to executions, so a single mutex over
//! lookups and inserts is enough. Failed rewrites are never cached.
//!
//! [`Database`]: crate::Database

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::rewriter::Transformed;

/// Upper bound on dynamically rewritten queries kept in memory.
const MAX_CACHED_QUERIES: usize = 1000;

/// LRU cache of normalized query -> rewrite.
///
/// Storage is allocated on the first insert.
#[derive(Default)]
pub(crate) struct RewriteCache {
    inner: Mutex<Option<LruCache<String, Transformed>>>,
}

impl RewriteCache {
    pub(crate) fn lookup(&self, query: &str) -> Option<Transformed> {
        self.inner.lock().as_mut()?.get(query).cloned()
    }

    pub(crate) fn insert(&self, query: String, transformed: Transformed) {
        let mut guard = self.inner.lock();
        let cache = guard.get_or_insert_with(|| {
            LruCache::new(NonZeroUsize::new(MAX_CACHED_QUERIES).unwrap())
        });
        cache.put(query, transformed);
    }
}
