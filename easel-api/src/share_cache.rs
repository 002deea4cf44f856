// Lightweight negative cache which temporarily remembers share ids that
// resolved to nothing, so repeated probes for missing or revoked links do
// not reach the database.
use crate::metrics_defs::{SHARE_CACHE_HIT, SHARE_CACHE_MISS};
use moka::sync::Cache;
use shared::counter;
use std::time::Duration;

const SIZE: u64 = 10_000;
const TTL_SECS: u64 = 30;

pub struct ShareNegativeCache {
    cache: Cache<String, ()>,
}

impl ShareNegativeCache {
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(SIZE)
            .time_to_live(Duration::from_secs(TTL_SECS))
            .build();

        ShareNegativeCache { cache }
    }

    pub fn insert(&self, share_id: &str) {
        self.cache.insert(share_id.to_string(), ());
    }

    pub fn contains(&self, share_id: &str) -> bool {
        let cache_hit = self.cache.contains_key(share_id);
        let metric_def = if cache_hit {
            SHARE_CACHE_HIT
        } else {
            SHARE_CACHE_MISS
        };
        counter!(metric_def).increment(1);
        cache_hit
    }
}

impl Default for ShareNegativeCache {
    fn default() -> Self {
        Self::new()
    }
}
