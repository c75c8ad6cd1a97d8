use std::hash::Hash;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K> {
  key: K,
  next: Option<Index>,
  prev: Option<Index>,
}

/// A recency-ordered list of keys with O(1) lookup, removal and promotion.
///
/// Used for both the resident (T1/T2) and ghost (B1/B2) lists of the ARC
/// store. The head is the most recently used key.
#[derive(Debug)]
pub(super) struct LruList<K: Eq + Hash + Clone> {
  nodes: Arena<Node<K>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K: Eq + Hash + Clone> LruList<K> {
  pub(super) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Does not touch the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  pub(super) fn len(&self) -> usize {
    self.lookup.len()
  }

  pub(super) fn contains(&self, key: &K) -> bool {
    self.lookup.contains_key(key)
  }

  /// Inserts `key` at the head, or promotes it there if already present.
  pub(super) fn push_front(&mut self, key: K) {
    if let Some(&index) = self.lookup.get(&key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.link_front(index);
      }
      return;
    }

    let index = self.nodes.insert(Node {
      key: key.clone(),
      next: None,
      prev: None,
    });
    self.lookup.insert(key, index);
    self.link_front(index);
  }

  /// Removes and returns the least recently used key.
  pub(super) fn pop_back(&mut self) -> Option<K> {
    let tail = self.tail?;
    let key = self.nodes[tail].key.clone();
    self.remove(&key);
    Some(key)
  }

  pub(super) fn remove(&mut self, key: &K) -> bool {
    match self.lookup.remove(key) {
      Some(index) => {
        self.unlink(index);
        self.nodes.remove(index);
        true
      }
      None => false,
    }
  }

  #[cfg(test)]
  pub(super) fn keys_as_vec(&self) -> Vec<K> {
    let mut keys = Vec::with_capacity(self.len());
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}
