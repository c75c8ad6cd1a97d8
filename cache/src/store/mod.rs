mod arc;
mod lru_list;

pub use arc::ArcStore;

use crate::entry::Entry;

/// A fixed-capacity associative store that the cache reads from and writes
/// computed entries into.
///
/// Implementations own their eviction policy and must be safe for concurrent
/// `get`/`add` calls from many threads. Expired entries are never removed by
/// the cache itself; they stay retrievable until the store evicts them.
pub trait BoundedStore<K, V>: Send + Sync {
  /// Looks up an entry. A lookup may count as an access for the policy.
  fn get(&self, key: &K) -> Option<Entry<V>>;

  /// Inserts or replaces an entry. Returns `true` if another key had to be
  /// evicted to make room.
  fn add(&self, key: K, entry: Entry<V>) -> bool;

  /// Returns the number of resident entries.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
