use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) stale_hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) coalesced: CachePadded<AtomicU64>,

  // --- Computations ---
  pub(crate) loads_started: CachePadded<AtomicU64>,
  pub(crate) loads_stored: CachePadded<AtomicU64>,
  pub(crate) loads_discarded: CachePadded<AtomicU64>,
  pub(crate) loads_failed: CachePadded<AtomicU64>,

  // --- Store ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      stale_hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      coalesced: CachePadded::new(AtomicU64::new(0)),
      loads_started: CachePadded::new(AtomicU64::new(0)),
      loads_stored: CachePadded::new(AtomicU64::new(0)),
      loads_discarded: CachePadded::new(AtomicU64::new(0)),
      loads_failed: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let stale_hits = self.stale_hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + stale_hits + misses;

    MetricsSnapshot {
      hits,
      stale_hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        (hits + stale_hits) as f64 / total_lookups as f64
      },
      coalesced: self.coalesced.load(Ordering::Relaxed),
      loads_started: self.loads_started.load(Ordering::Relaxed),
      loads_stored: self.loads_stored.load(Ordering::Relaxed),
      loads_discarded: self.loads_discarded.load(Ordering::Relaxed),
      loads_failed: self.loads_failed.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups answered by a fresh entry.
  pub hits: u64,
  /// Lookups answered by a stale entry while a refresh was requested.
  pub stale_hits: u64,
  /// Lookups that found nothing usable and had to wait for a computation.
  pub misses: u64,
  /// Misses that joined a computation another caller had already started.
  pub coalesced: u64,
  /// The cache hit ratio ((hits + stale_hits) / all lookups).
  pub hit_ratio: f64,
  /// Computations submitted to the dispatcher.
  pub loads_started: u64,
  /// Computations whose result was written to the store.
  pub loads_stored: u64,
  /// Computations that returned no value while absences are not cached.
  pub loads_discarded: u64,
  /// Computations that returned an error or never finished, such as one
  /// that panicked or was dropped before it ran.
  pub loads_failed: u64,
  /// Entries written to the store.
  pub inserts: u64,
  /// Writes that made the store evict another key.
  pub evicted_by_capacity: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("stale_hits", &self.stale_hits)
      .field("misses", &self.misses)
      .field("coalesced", &self.coalesced)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads_started", &self.loads_started)
      .field("loads_stored", &self.loads_stored)
      .field("loads_discarded", &self.loads_discarded)
      .field("loads_failed", &self.loads_failed)
      .field("inserts", &self.inserts)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
