//! Prepared-query cache (C7): parse once, keyed by a fingerprint of the SQL text.
//!
//! No teacher module does this — the teacher's connection handler re-parses every
//! statement it receives. This is new code written directly from spec §4.7's description
//! of a capacity-bounded cache with approximate-LRU (two-way random sampling) eviction,
//! using the `rand` dependency the teacher already carries for other purposes.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;

pub type Fingerprint = u64;

pub fn fingerprint(sql: &str) -> Fingerprint {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    hasher.finish()
}

struct Entry<T> {
    plan: Arc<T>,
    last_used: u64,
}

/// Thread-safe, capacity-bounded cache of compiled plans. On insert past capacity, two
/// entries are sampled at random and the less-recently-used of the two is evicted
/// (two-way random sampling approximates true LRU without a linked-list).
pub struct QueryCache<T> {
    capacity: usize,
    entries: Mutex<HashMap<Fingerprint, Entry<T>>>,
    clock: AtomicU64,
}

impl<T> QueryCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(HashMap::new()), clock: AtomicU64::new(0) }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, sql: &str) -> Option<Arc<T>> {
        let key = fingerprint(sql);
        let mut entries = self.entries.lock().unwrap();
        let tick = self.tick();
        entries.get_mut(&key).map(|entry| {
            entry.last_used = tick;
            entry.plan.clone()
        })
    }

    /// Fetch a cached plan, or compile and insert one if absent or stale-fingerprint-miss.
    pub fn get_or_compile<E>(
        &self,
        sql: &str,
        compile: impl FnOnce(&str) -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(plan) = self.get(sql) {
            return Ok(plan);
        }
        let plan = Arc::new(compile(sql)?);
        self.insert(sql, plan.clone());
        Ok(plan)
    }

    fn insert(&self, sql: &str, plan: Arc<T>) {
        if self.capacity == 0 {
            return;
        }
        let key = fingerprint(sql);
        let tick = self.tick();
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            self.evict_one(&mut entries);
        }
        entries.insert(key, Entry { plan, last_used: tick });
    }

    fn evict_one(&self, entries: &mut HashMap<Fingerprint, Entry<T>>) {
        if entries.is_empty() {
            return;
        }
        let keys: Vec<Fingerprint> = entries.keys().copied().collect();
        let mut rng = rand::thread_rng();
        let a = keys[rng.gen_range(0..keys.len())];
        let b = keys[rng.gen_range(0..keys.len())];
        let evict = if entries[&a].last_used <= entries[&b].last_used { a } else { b };
        entries.remove(&evict);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_compile_caches_the_result() {
        let cache: QueryCache<String> = QueryCache::new(4);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let compile = |sql: &str| -> Result<String, ()> {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(sql.to_uppercase())
        };
        let a = cache.get_or_compile("select 1", compile).unwrap();
        let b = cache.get_or_compile("select 1", compile).unwrap();
        assert_eq!(*a, "SELECT 1");
        assert_eq!(*b, "SELECT 1");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn eviction_keeps_capacity_bounded() {
        let cache: QueryCache<String> = QueryCache::new(2);
        let noop = |sql: &str| -> Result<String, ()> { Ok(sql.to_string()) };
        cache.get_or_compile("a", noop).unwrap();
        cache.get_or_compile("b", noop).unwrap();
        cache.get_or_compile("c", noop).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_never_caches() {
        let cache: QueryCache<String> = QueryCache::new(0);
        let noop = |sql: &str| -> Result<String, ()> { Ok(sql.to_string()) };
        cache.get_or_compile("a", noop).unwrap();
        cache.get_or_compile("b", noop).unwrap();
        assert!(cache.is_empty());
    }
}
