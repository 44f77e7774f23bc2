//! Tool binary availability probing.
//!
//! Resolves wrapped binaries on the execution PATH and caches the answer for
//! a short TTL so repeated health checks stay cheap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Probe {
    available: bool,
    checked_at: Instant,
}

pub struct AvailabilityCache {
    ttl: Duration,
    inner: Mutex<HashMap<String, Probe>>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `binary` is reachable on PATH, served from cache while fresh.
    pub fn check(&self, binary: &str) -> bool {
        {
            let cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(probe) = cache.get(binary) {
                if probe.checked_at.elapsed() < self.ttl {
                    return probe.available;
                }
            }
        }

        // Probe outside the lock; PATH walks can touch slow filesystems.
        let available = which::which(binary).is_ok();
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            binary.to_string(),
            Probe {
                available,
                checked_at: Instant::now(),
            },
        );
        available
    }

    /// Uncached PATH resolution, for the tool-test introspection endpoint.
    pub fn resolve(binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    #[cfg(test)]
    fn seed(&self, binary: &str, available: bool) {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            binary.to_string(),
            Probe {
                available,
                checked_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_binary() {
        let cache = AvailabilityCache::new(Duration::from_secs(30));
        assert!(cache.check("sh"));
    }

    #[test]
    fn test_missing_binary() {
        let cache = AvailabilityCache::new(Duration::from_secs(30));
        assert!(!cache.check("armory-no-such-binary"));
    }

    #[test]
    fn test_fresh_cache_entry_is_served() {
        let cache = AvailabilityCache::new(Duration::from_secs(300));
        // A seeded lie proves the cache answers without re-probing.
        cache.seed("sh", false);
        assert!(!cache.check("sh"));
    }

    #[test]
    fn test_stale_entry_is_reprobed() {
        let cache = AvailabilityCache::new(Duration::ZERO);
        cache.seed("sh", false);
        assert!(cache.check("sh"));
    }

    #[test]
    fn test_resolve_returns_path() {
        assert!(AvailabilityCache::resolve("sh").is_some());
        assert!(AvailabilityCache::resolve("armory-no-such-binary").is_none());
    }
}
