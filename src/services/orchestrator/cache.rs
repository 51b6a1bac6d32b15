//! Tagged Result Cache
//!
//! Query results keyed by a deterministic hash of tool name plus argument
//! pairs sorted by key, so argument insertion order never splits the cache.
//! Entries carry resource tags; a mutating action invalidates every entry
//! whose tags intersect the resources it touched.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

/// Default TTL before a mode controller adjusts it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: String,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub tags: Vec<String>,
    /// Bumped on every hit; payload itself never changes after creation
    pub access_count: u64,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Deterministic cache key over tool name and sorted argument pairs.
pub fn cache_key(tool_name: &str, args: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    tool_name.hash(&mut hasher);
    if let Some(map) = args.as_object() {
        let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
        pairs.sort_by_key(|(k, _)| k.as_str());
        for (key, value) in pairs {
            key.hash(&mut hasher);
            value.to_string().hash(&mut hasher);
        }
    } else {
        args.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

/// TTL-aware tagged cache behind a reader/writer lock (frequent reads,
/// occasional writes).
pub struct ResultCache {
    entries: RwLock<HashMap<u64, CacheEntry>>,
    default_ttl: RwLock<Duration>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: RwLock::new(DEFAULT_TTL),
        }
    }

    /// Live entry for the key, bumping its access count.
    pub fn get(&self, key: u64) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(&key) {
            Some(entry) if entry.is_live(now) => {
                entry.access_count += 1;
                Some(entry.result.clone())
            }
            _ => None,
        }
    }

    /// Store a result under the current default TTL.
    pub fn set(&self, key: u64, result: String, tags: Vec<String>) {
        let ttl = *self.default_ttl.read().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
                ttl,
                tags,
                access_count: 0,
            },
        );
    }

    /// Drop every entry sharing at least one tag; returns how many went.
    pub fn invalidate_tags(&self, tags: &[String]) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| tags.contains(t)));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "cache entries invalidated by tag");
        }
        evicted
    }

    /// Periodic sweep purging expired entries.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mode-driven TTL adjustment; existing entries keep the TTL they were
    /// stored with.
    pub fn set_default_ttl(&self, ttl: Duration) {
        let mut default = self.default_ttl.write().unwrap_or_else(|e| e.into_inner());
        *default = ttl;
    }

    #[cfg(test)]
    fn set_with_ttl(&self, key: u64, result: String, tags: Vec<String>, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
                ttl,
                tags,
                access_count: 0,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_argument_order() {
        let a = json!({"sheet": "Vendas", "range": "A1:C9"});
        let b = json!({"range": "A1:C9", "sheet": "Vendas"});
        assert_eq!(
            cache_key("get_range_values", &a),
            cache_key("get_range_values", &b)
        );
    }

    #[test]
    fn test_key_differs_by_tool_and_args() {
        let args = json!({"sheet": "Vendas"});
        assert_ne!(
            cache_key("get_used_range", &args),
            cache_key("get_headers", &args)
        );
        assert_ne!(
            cache_key("get_used_range", &args),
            cache_key("get_used_range", &json!({"sheet": "Outra"}))
        );
    }

    #[test]
    fn test_hit_within_ttl_and_miss_after() {
        let cache = ResultCache::new();
        let key = cache_key("list_sheets", &json!({}));
        cache.set_with_ttl(key, "Sheet1".to_string(), vec![], Duration::from_millis(20));

        assert_eq!(cache.get(key).as_deref(), Some("Sheet1"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(key).is_none());
    }

    #[test]
    fn test_cleanup_purges_expired() {
        let cache = ResultCache::new();
        cache.set_with_ttl(1, "a".to_string(), vec![], Duration::from_millis(5));
        cache.set(2, "b".to_string(), vec![]);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_by_tag() {
        let cache = ResultCache::new();
        cache.set(1, "a".to_string(), vec!["sheet:Vendas".to_string()]);
        cache.set(
            2,
            "b".to_string(),
            vec!["sheet:Outra".to_string(), "workbook:*".to_string()],
        );
        cache.set(3, "c".to_string(), vec!["sheet:Vendas".to_string()]);

        let evicted = cache.invalidate_tags(&["sheet:Vendas".to_string()]);
        assert_eq!(evicted, 2);
        assert!(cache.get(2).is_some());

        assert_eq!(cache.invalidate_tags(&["workbook:*".to_string()]), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_access_count_bumps() {
        let cache = ResultCache::new();
        cache.set(1, "a".to_string(), vec![]);
        cache.get(1);
        cache.get(1);
        let entries = cache.entries.read().unwrap();
        assert_eq!(entries.get(&1).unwrap().access_count, 2);
    }
}
