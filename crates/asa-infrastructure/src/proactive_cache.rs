//! In-memory, TTL-bounded cache of generated proactive messages.

use asa_core::provider::ProactiveCache;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const CACHE_KEY_PREFIX: &str = "asa_proactive_message_";

/// Derives the cache key for a page: a SHA-256 fingerprint of `url + content`.
pub fn proactive_cache_key(url: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(content.as_bytes());
    format!("{CACHE_KEY_PREFIX}{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    message: String,
    expires_at: Instant,
}

/// Shared proactive message cache.
///
/// Expired entries are invisible to readers and pruned on the next write.
#[derive(Debug, Clone, Default)]
pub struct MemoryProactiveCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryProactiveCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProactiveCache for MemoryProactiveCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.message.clone())
    }

    async fn put(&self, key: String, message: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                message,
                expires_at: now + ttl,
            },
        );
    }

    async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}
