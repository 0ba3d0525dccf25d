//! ============================================================================
//! Verdict Cache - Short-lived memoization of access verdicts
//! ============================================================================
//! Keyed by (viewer, post). Entries expire after their TTL and the cache is
//! bounded; past the bound the least recently used entry is evicted. An entry
//! may also carry an evaluation-time bound (a subscription's expiry), and a
//! `get` for a later evaluation time misses.
//!
//! Invalidation is linearized ahead of later reads: once `invalidate`
//! returns, no `get` for that key sees the old verdict. Writers that gathered
//! facts before an invalidation hold a stale `CacheTicket` and their
//! `put_if_current` is rejected, so a fresh purchase or subscription is
//! never masked by an in-flight denial.
//! ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::types::AccessVerdict;
use crate::config::DEFAULT_CACHE_MAX_ENTRIES;
use crate::types::AccessError;

/// Snapshot of the cache's invalidation clock, taken before fact assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheTicket(u64);

/// How long a stored verdict may be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLifetime {
    /// Measured on the cache's own clock from the moment of storing
    pub ttl: Duration,
    /// Evaluation times at or past this instant miss
    pub valid_until: Option<DateTime<Utc>>,
}

impl EntryLifetime {
    pub const fn for_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            valid_until: None,
        }
    }

    pub fn until(self, valid_until: DateTime<Utc>) -> Self {
        Self {
            valid_until: Some(valid_until),
            ..self
        }
    }
}

/// Storage backend for verdicts. Backend failures surface as
/// `AccessError::CacheUnavailable`; callers bypass the cache on error.
#[async_trait]
pub trait VerdictStore: Send + Sync {
    /// Cached verdict for an evaluation at time `at`, if one is still valid
    async fn get(
        &self,
        viewer_id: &str,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AccessVerdict>, AccessError>;

    async fn put(
        &self,
        viewer_id: &str,
        post_id: &str,
        verdict: AccessVerdict,
        lifetime: EntryLifetime,
    ) -> Result<(), AccessError>;

    async fn invalidate(&self, viewer_id: &str, post_id: &str) -> Result<(), AccessError>;

    /// Drop every cached verdict for a viewer; returns how many were live
    async fn invalidate_viewer(&self, viewer_id: &str) -> Result<usize, AccessError>;

    /// Take a ticket before gathering the facts a verdict will be built from
    async fn ticket(&self) -> Result<CacheTicket, AccessError>;

    /// Store only if the key was not invalidated since `ticket` was taken.
    /// Returns whether the verdict was stored.
    async fn put_if_current(
        &self,
        viewer_id: &str,
        post_id: &str,
        verdict: AccessVerdict,
        lifetime: EntryLifetime,
        ticket: CacheTicket,
    ) -> Result<bool, AccessError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    viewer_id: String,
    post_id: String,
}

impl CacheKey {
    fn new(viewer_id: &str, post_id: &str) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            post_id: post_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedVerdict {
    verdict: AccessVerdict,
    expires_at: Instant,
    valid_until: Option<DateTime<Utc>>,
}

/// One key's state. A slot without a verdict is an invalidation marker that
/// remembers the generation it was invalidated at.
#[derive(Debug)]
struct Slot {
    cached: Option<CachedVerdict>,
    generation: u64,
    last_used: AtomicU64,
}

impl Slot {
    fn live_verdict(&self, now: Instant) -> Option<&CachedVerdict> {
        self.cached.as_ref().filter(|c| c.expires_at > now)
    }
}

#[derive(Debug, Default)]
struct Slots {
    map: HashMap<CacheKey, Slot>,
    /// Highest generation among slots dropped by eviction or clear
    evicted_generation: u64,
    /// Generation of each viewer's last `invalidate_viewer`
    viewer_generations: HashMap<String, u64>,
}

impl Slots {
    fn remove(&mut self, key: &CacheKey) {
        if let Some(slot) = self.map.remove(key) {
            self.evicted_generation = self.evicted_generation.max(slot.generation);
        }
    }

    /// Generation a ticket must be at or past to write this key
    fn write_floor(&self, key: &CacheKey) -> u64 {
        match self.map.get(key) {
            Some(slot) => slot.generation,
            None => self
                .viewer_generations
                .get(&key.viewer_id)
                .copied()
                .unwrap_or(0)
                .max(self.evicted_generation),
        }
    }

    /// Record a viewer-wide invalidation. Past `limit` tracked viewers the
    /// per-viewer floors fold into the global one.
    fn raise_viewer_floor(&mut self, viewer_id: &str, generation: u64, limit: usize) {
        self.viewer_generations.insert(viewer_id.to_string(), generation);
        if self.viewer_generations.len() > limit {
            let highest = self.viewer_generations.drain().map(|(_, g)| g).max().unwrap_or(0);
            self.evicted_generation = self.evicted_generation.max(highest);
            debug!("Folded per-viewer invalidation floors into generation {}", self.evicted_generation);
        }
    }
}

/// In-memory verdict cache with TTL expiry and an LRU size bound
pub struct VerdictCache {
    slots: RwLock<Slots>,
    generation: AtomicU64,
    tick: AtomicU64,
    max_entries: usize,
}

impl VerdictCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            generation: AtomicU64::new(0),
            tick: AtomicU64::new(0),
            max_entries: max_entries.max(1),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn insert(&self, slots: &mut Slots, key: CacheKey, verdict: AccessVerdict, lifetime: EntryLifetime) {
        let now = Instant::now();

        if !slots.map.contains_key(&key) && slots.map.len() >= self.max_entries {
            self.evict(slots, now);
        }

        let cached = CachedVerdict {
            verdict,
            expires_at: now + lifetime.ttl,
            valid_until: lifetime.valid_until,
        };
        let floor = slots.write_floor(&key);
        let slot = slots.map.entry(key).or_insert_with(|| Slot {
            cached: None,
            generation: floor,
            last_used: AtomicU64::new(0),
        });
        slot.cached = Some(cached);
        slot.last_used.store(self.next_tick(), Ordering::Relaxed);
    }

    /// Make room for one entry: drop dead slots first, then the LRU one
    fn evict(&self, slots: &mut Slots, now: Instant) {
        let dead: Vec<CacheKey> = slots
            .map
            .iter()
            .filter(|(_, slot)| slot.live_verdict(now).is_none())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            slots.remove(key);
        }

        if slots.map.len() >= self.max_entries {
            if let Some(lru_key) = slots
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone())
            {
                debug!(
                    "Evicting least recently used verdict for viewer {} on post {}",
                    lru_key.viewer_id, lru_key.post_id
                );
                slots.remove(&lru_key);
            }
        }
    }

    /// Clear the entire cache; in-flight tickets become stale
    pub async fn clear(&self) {
        let mut slots = self.slots.write().await;
        let count = slots.map.len();
        slots.map.clear();
        slots.viewer_generations.clear();
        slots.evicted_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Cleared {} cached verdict entries", count);
    }

    /// Get cache statistics: (total slots, live verdicts)
    pub async fn cache_stats(&self) -> (usize, usize) {
        let slots = self.slots.read().await;
        let now = Instant::now();
        let total = slots.map.len();
        let live = slots
            .map
            .values()
            .filter(|s| s.live_verdict(now).is_some())
            .count();
        (total, live)
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerdictStore for VerdictCache {
    async fn get(
        &self,
        viewer_id: &str,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<AccessVerdict>, AccessError> {
        let key = CacheKey::new(viewer_id, post_id);
        let slots = self.slots.read().await;

        let hit = slots.map.get(&key).and_then(|slot| {
            slot.live_verdict(Instant::now())
                .filter(|c| c.valid_until.map_or(true, |until| at < until))
                .map(|c| {
                    slot.last_used.store(self.next_tick(), Ordering::Relaxed);
                    c.verdict.clone()
                })
        });

        match &hit {
            Some(v) => debug!("Cache hit for viewer {} on post {}: granted={}", viewer_id, post_id, v.granted),
            None => debug!("Cache miss for viewer {} on post {}", viewer_id, post_id),
        }
        Ok(hit)
    }

    async fn put(
        &self,
        viewer_id: &str,
        post_id: &str,
        verdict: AccessVerdict,
        lifetime: EntryLifetime,
    ) -> Result<(), AccessError> {
        let mut slots = self.slots.write().await;
        self.insert(&mut slots, CacheKey::new(viewer_id, post_id), verdict, lifetime);
        Ok(())
    }

    async fn invalidate(&self, viewer_id: &str, post_id: &str) -> Result<(), AccessError> {
        let key = CacheKey::new(viewer_id, post_id);
        let mut slots = self.slots.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !slots.map.contains_key(&key) && slots.map.len() >= self.max_entries {
            self.evict(&mut slots, Instant::now());
        }

        let slot = slots.map.entry(key).or_insert_with(|| Slot {
            cached: None,
            generation,
            last_used: AtomicU64::new(0),
        });
        slot.generation = generation;
        slot.last_used.store(self.next_tick(), Ordering::Relaxed);
        let had_verdict = slot.cached.take().is_some();

        if had_verdict {
            info!("Invalidated cached verdict for viewer {} on post {}", viewer_id, post_id);
        }
        Ok(())
    }

    async fn invalidate_viewer(&self, viewer_id: &str) -> Result<usize, AccessError> {
        let mut slots = self.slots.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Instant::now();

        let mut count = 0;
        for (key, slot) in slots.map.iter_mut() {
            if key.viewer_id == viewer_id {
                if slot.live_verdict(now).is_some() {
                    count += 1;
                }
                slot.cached = None;
                slot.generation = generation;
            }
        }
        // Keys for this viewer that are not cached yet
        slots.raise_viewer_floor(viewer_id, generation, self.max_entries);

        info!("Invalidated {} cached verdicts for viewer {}", count, viewer_id);
        Ok(count)
    }

    async fn ticket(&self) -> Result<CacheTicket, AccessError> {
        Ok(CacheTicket(self.generation.load(Ordering::SeqCst)))
    }

    async fn put_if_current(
        &self,
        viewer_id: &str,
        post_id: &str,
        verdict: AccessVerdict,
        lifetime: EntryLifetime,
        ticket: CacheTicket,
    ) -> Result<bool, AccessError> {
        let key = CacheKey::new(viewer_id, post_id);
        let mut slots = self.slots.write().await;

        if slots.write_floor(&key) > ticket.0 {
            debug!(
                "Discarding stale verdict for viewer {} on post {} (invalidated since ticket {})",
                viewer_id, post_id, ticket.0
            );
            return Ok(false);
        }

        self.insert(&mut slots, key, verdict, lifetime);
        Ok(true)
    }
}
