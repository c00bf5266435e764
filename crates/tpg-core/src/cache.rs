//! Evaluation cache: `off` / `per_input` / `lru`, per `spec.md` §4.9.
//!
//! Logically a mapping `ProgramId -> (input_hash -> bid)`. The sequential
//! variant ([`EvalCache`]) is what the single-threaded core uses during
//! normal evaluation and mutation. [`ConcurrentLruCache`] is the one
//! exception carved out by `spec.md` §5: during the evolutionary harness's
//! warmup phase, many worker threads populate the cache concurrently, and
//! LRU is the only mode the spec guarantees is safe for that.

use std::collections::HashMap;

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::id::ProgramId;

/// Default bound for LRU mode when the caller doesn't specify one.
pub const DEFAULT_LRU_MAX_SIZE: usize = 1000;

/// Which of the three caching strategies an evaluation run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// No storage; every evaluation recomputes.
    Off,
    /// Unbounded `(program, input_hash) -> bid` mapping.
    PerInput,
    /// Bounded, per-program LRU mapping.
    Lru { max_size: usize },
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Lru {
            max_size: DEFAULT_LRU_MAX_SIZE,
        }
    }
}

/// Per-program LRU bid cache with hit/miss counters.
///
/// Backed by an [`IndexMap`] so the least-recently-used entry is always the
/// front of insertion order: every successful `get` moves its key to the
/// back, and eviction on overflow shifts the front entry off.
#[derive(Debug, Clone, Default)]
struct LruInner {
    entries: IndexMap<u64, f64>,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl LruInner {
    fn new(max_size: usize) -> Self {
        LruInner {
            entries: IndexMap::new(),
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, key: u64) -> Option<f64> {
        match self.entries.shift_remove(&key) {
            Some(value) => {
                self.entries.insert(key, value);
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: u64, value: f64) {
        self.entries.shift_remove(&key);
        if self.entries.len() >= self.max_size && !self.entries.is_empty() {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }
}

#[derive(Debug, Clone)]
enum Inner {
    PerInput(HashMap<u64, f64>),
    Lru(LruInner),
}

/// Sequential, single-threaded evaluation cache used outside the warmup
/// phase.
#[derive(Debug, Clone)]
pub struct EvalCache {
    mode: CacheMode,
    programs: HashMap<ProgramId, Inner>,
}

impl EvalCache {
    /// Creates an empty cache operating in the given mode.
    pub fn new(mode: CacheMode) -> Self {
        EvalCache {
            mode,
            programs: HashMap::new(),
        }
    }

    /// The mode this cache was constructed with.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    fn inner_for(&mut self, program: ProgramId) -> Option<&mut Inner> {
        match self.mode {
            CacheMode::Off => None,
            CacheMode::PerInput => Some(
                self.programs
                    .entry(program)
                    .or_insert_with(|| Inner::PerInput(HashMap::new())),
            ),
            CacheMode::Lru { max_size } => Some(
                self.programs
                    .entry(program)
                    .or_insert_with(|| Inner::Lru(LruInner::new(max_size))),
            ),
        }
    }

    /// Looks up a cached bid for `program` at `key`. Always `None` in `Off`
    /// mode.
    pub fn get(&mut self, program: ProgramId, key: u64) -> Option<f64> {
        match self.inner_for(program)? {
            Inner::PerInput(map) => map.get(&key).copied(),
            Inner::Lru(lru) => lru.get(key),
        }
    }

    /// Stores a bid for `program` at `key`. A no-op in `Off` mode.
    pub fn insert(&mut self, program: ProgramId, key: u64, value: f64) {
        if let Some(inner) = self.inner_for(program) {
            match inner {
                Inner::PerInput(map) => {
                    map.insert(key, value);
                }
                Inner::Lru(lru) => lru.insert(key, value),
            }
        }
    }

    /// Drops all cache entries for a program. Called by GC when the
    /// program's record is deleted.
    pub fn remove_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    /// Duplicates `from`'s inner mapping under `to`. Used when a program's
    /// action (not its bid function) is mutated: the new program's bids are
    /// identical to the old one's, so its cache is inherited rather than
    /// recomputed.
    pub fn copy_cache(&mut self, from: ProgramId, to: ProgramId) {
        if let Some(inner) = self.programs.get(&from) {
            let cloned = inner.clone();
            self.programs.insert(to, cloned);
        }
    }

    /// Hit/miss counters for a program, if it has ever been cached under LRU
    /// mode. `None` for programs never seen, or under `Off`/`PerInput` modes.
    pub fn lru_stats(&self, program: ProgramId) -> Option<(u64, u64)> {
        match self.programs.get(&program) {
            Some(Inner::Lru(lru)) => Some((lru.hits, lru.misses)),
            _ => None,
        }
    }
}

/// Concurrent, LRU-only cache for the warmup phase described in `spec.md`
/// §5: many worker threads each evaluate `(program, batch-item)` pairs and
/// populate the shared cache, with no ordering requirement across threads.
///
/// Per-program get-or-create on the outer map is atomic (`DashMap`'s
/// sharded locking); each program's inner `LruInner` is behind that shard's
/// lock for the duration of a single `record`/`lookup` call, so concurrent
/// writers to the *same* program serialize briefly but writers to different
/// programs never contend.
#[derive(Debug, Default)]
pub struct ConcurrentLruCache {
    max_size: usize,
    programs: DashMap<ProgramId, LruInner>,
}

impl ConcurrentLruCache {
    /// Creates an empty concurrent cache with the given per-program bound.
    pub fn new(max_size: usize) -> Self {
        ConcurrentLruCache {
            max_size,
            programs: DashMap::new(),
        }
    }

    /// Looks up a cached bid, recording a hit or miss.
    pub fn lookup(&self, program: ProgramId, key: u64) -> Option<f64> {
        let mut entry = self
            .programs
            .entry(program)
            .or_insert_with(|| LruInner::new(self.max_size));
        entry.get(key)
    }

    /// Records a freshly computed bid.
    pub fn record(&self, program: ProgramId, key: u64, value: f64) {
        let mut entry = self
            .programs
            .entry(program)
            .or_insert_with(|| LruInner::new(self.max_size));
        entry.insert(key, value);
    }

    /// Drains this concurrent cache into a sequential [`EvalCache`] in `Lru`
    /// mode, for use once the harness returns to single-threaded operation.
    pub fn into_sequential(self) -> EvalCache {
        let mode = CacheMode::Lru {
            max_size: self.max_size,
        };
        let mut seq = EvalCache::new(mode);
        for (program, lru) in self.programs.into_iter() {
            seq.programs.insert(program, Inner::Lru(lru));
        }
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_never_stores() {
        let mut cache = EvalCache::new(CacheMode::Off);
        cache.insert(ProgramId(1), 42, 3.0);
        assert_eq!(cache.get(ProgramId(1), 42), None);
    }

    #[test]
    fn per_input_mode_is_unbounded() {
        let mut cache = EvalCache::new(CacheMode::PerInput);
        for key in 0..5000u64 {
            cache.insert(ProgramId(1), key, key as f64);
        }
        assert_eq!(cache.get(ProgramId(1), 4999), Some(4999.0));
        assert_eq!(cache.get(ProgramId(1), 0), Some(0.0));
    }

    #[test]
    fn lru_mode_evicts_least_recently_used() {
        let mut cache = EvalCache::new(CacheMode::Lru { max_size: 2 });
        cache.insert(ProgramId(1), 1, 1.0);
        cache.insert(ProgramId(1), 2, 2.0);
        // touch key 1 so key 2 becomes the least-recently-used entry
        assert_eq!(cache.get(ProgramId(1), 1), Some(1.0));
        cache.insert(ProgramId(1), 3, 3.0);
        assert_eq!(cache.get(ProgramId(1), 2), None);
        assert_eq!(cache.get(ProgramId(1), 1), Some(1.0));
        assert_eq!(cache.get(ProgramId(1), 3), Some(3.0));
    }

    #[test]
    fn lru_stats_count_hits_and_misses() {
        let mut cache = EvalCache::new(CacheMode::Lru { max_size: 10 });
        cache.insert(ProgramId(1), 1, 1.0);
        cache.get(ProgramId(1), 1); // hit
        cache.get(ProgramId(1), 2); // miss
        assert_eq!(cache.lru_stats(ProgramId(1)), Some((1, 1)));
    }

    #[test]
    fn remove_program_drops_entries() {
        let mut cache = EvalCache::new(CacheMode::PerInput);
        cache.insert(ProgramId(1), 1, 1.0);
        cache.remove_program(ProgramId(1));
        assert_eq!(cache.get(ProgramId(1), 1), None);
    }

    #[test]
    fn copy_cache_duplicates_inner_mapping() {
        let mut cache = EvalCache::new(CacheMode::PerInput);
        cache.insert(ProgramId(1), 1, 9.0);
        cache.copy_cache(ProgramId(1), ProgramId(2));
        assert_eq!(cache.get(ProgramId(2), 1), Some(9.0));
        // independent afterwards
        cache.insert(ProgramId(2), 2, 10.0);
        assert_eq!(cache.get(ProgramId(1), 2), None);
    }

    #[test]
    fn concurrent_cache_records_and_looks_up() {
        let cache = ConcurrentLruCache::new(100);
        std::thread::scope(|scope| {
            for i in 0..8u64 {
                let cache = &cache;
                scope.spawn(move || {
                    cache.record(ProgramId(1), i, i as f64);
                });
            }
        });
        for i in 0..8u64 {
            assert_eq!(cache.lookup(ProgramId(1), i), Some(i as f64));
        }
    }

    #[test]
    fn concurrent_cache_drains_into_sequential() {
        let cache = ConcurrentLruCache::new(10);
        cache.record(ProgramId(1), 1, 5.0);
        let seq = cache.into_sequential();
        let mut seq = seq;
        assert_eq!(seq.get(ProgramId(1), 1), Some(5.0));
    }
}
