// ABOUTME: TTL-keyed cache contract for resolved site-config text.
// ABOUTME: Ships an in-memory implementation; callers may inject their own store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default TTL for resolved configs: four days, matching the historical
/// repository cache timeout.
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(345_600);

/// Keyed store with per-entry expiry. Lookups for the same key may race and
/// both compute the value; that is harmless since resolution is idempotent.
pub trait ConfigCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str, ttl: Duration);
}

/// In-process [`ConfigCache`] backed by a mutexed map. Expired entries are
/// dropped lazily on lookup.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), (Instant::now() + ttl, value.to_string()));
    }
}
