use super::lru_list::LruList;
use super::BoundedStore;
use crate::entry::Entry;
use crate::error::BuildError;

use std::fmt;
use std::hash::Hash;

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

/// A bounded store using the Adaptive Replacement Cache (ARC) algorithm.
///
/// Resident keys live in T1 (seen once recently) or T2 (seen at least twice).
/// Evicted keys are remembered without their values in the ghost lists B1 and
/// B2; a hit on a ghost shifts the adaptive target `p`, the share of capacity
/// given to T1, toward whichever side would have kept the key.
pub struct ArcStore<K: Eq + Hash + Clone, V> {
  state: Mutex<ArcState<K, V>>,
}

struct ArcState<K: Eq + Hash + Clone, V> {
  capacity: usize,
  // Target size of T1. T2's target is `capacity - p`.
  p: usize,
  t1: LruList<K>,
  t2: LruList<K>,
  b1: LruList<K>,
  b2: LruList<K>,
  entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash + Clone, V> ArcStore<K, V> {
  /// Creates a store holding at most `capacity` entries.
  pub fn new(capacity: usize) -> Result<Self, BuildError> {
    if capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    Ok(Self {
      state: Mutex::new(ArcState {
        capacity,
        p: 0,
        t1: LruList::new(),
        t2: LruList::new(),
        b1: LruList::new(),
        b2: LruList::new(),
        entries: HashMap::with_capacity(capacity),
      }),
    })
  }

  pub fn capacity(&self) -> usize {
    self.state.lock().capacity
  }
}

impl<K: Eq + Hash + Clone, V> fmt::Debug for ArcStore<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("ArcStore")
      .field("capacity", &state.capacity)
      .field("len", &state.entries.len())
      .field("p", &state.p)
      .finish_non_exhaustive()
  }
}

impl<K: Eq + Hash + Clone, V> ArcState<K, V> {
  fn is_full(&self) -> bool {
    self.t1.len() + self.t2.len() >= self.capacity
  }

  fn get(&mut self, key: &K) -> Option<Entry<V>> {
    // A second touch promotes from recency to frequency.
    if self.t1.remove(key) {
      self.t2.push_front(key.clone());
    } else if self.t2.contains(key) {
      self.t2.push_front(key.clone());
    } else {
      return None;
    }
    self.entries.get(key).cloned()
  }

  fn add(&mut self, key: K, entry: Entry<V>) -> bool {
    if self.t1.remove(&key) || self.t2.contains(&key) {
      self.t2.push_front(key.clone());
      self.entries.insert(key, entry);
      return false;
    }

    if self.b1.contains(&key) {
      let delta = (self.b2.len() / self.b1.len()).max(1);
      self.p = (self.p + delta).min(self.capacity);
      let evicted = self.is_full() && self.replace(false);
      self.b1.remove(&key);
      self.t2.push_front(key.clone());
      self.entries.insert(key, entry);
      return evicted;
    }

    if self.b2.contains(&key) {
      let delta = (self.b1.len() / self.b2.len()).max(1);
      self.p = self.p.saturating_sub(delta);
      let evicted = self.is_full() && self.replace(true);
      self.b2.remove(&key);
      self.t2.push_front(key.clone());
      self.entries.insert(key, entry);
      return evicted;
    }

    let evicted = self.is_full() && self.replace(false);

    // Keep the ghost lists within their targets.
    if self.b1.len() > self.capacity - self.p {
      self.b1.pop_back();
    }
    if self.b2.len() > self.p {
      self.b2.pop_back();
    }

    self.t1.push_front(key.clone());
    self.entries.insert(key, entry);
    evicted
  }

  // Evicts one resident key into its ghost list.
  fn replace(&mut self, key_in_b2: bool) -> bool {
    let t1_len = self.t1.len();
    let prefer_t1 = t1_len > 0 && (t1_len > self.p || (t1_len == self.p && key_in_b2));

    if prefer_t1 || self.t2.len() == 0 {
      if let Some(victim) = self.t1.pop_back() {
        self.entries.remove(&victim);
        self.b1.push_front(victim);
        return true;
      }
    }
    if let Some(victim) = self.t2.pop_back() {
      self.entries.remove(&victim);
      self.b2.push_front(victim);
      return true;
    }
    false
  }
}

impl<K, V> BoundedStore<K, V> for ArcStore<K, V>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
{
  fn get(&self, key: &K) -> Option<Entry<V>> {
    self.state.lock().get(key)
  }

  fn add(&self, key: K, entry: Entry<V>) -> bool {
    self.state.lock().add(key, entry)
  }

  fn len(&self) -> usize {
    self.state.lock().entries.len()
  }
}
