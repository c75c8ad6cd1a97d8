use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached payload plus its optional absolute expiry.
///
/// `value` is `None` when the compute function reported "no value" and the
/// cache was configured to keep absent results. `expires_at` is `None` for
/// entries that never go stale.
pub struct Entry<V> {
  pub(crate) value: Option<Arc<V>>,
  pub(crate) expires_at: Option<Instant>,
}

impl<V> Entry<V> {
  /// Creates a new entry.
  pub fn new(value: Option<Arc<V>>, expires_at: Option<Instant>) -> Self {
    Self { value, expires_at }
  }

  /// Returns the cached payload, if one was stored.
  #[inline]
  pub fn value(&self) -> Option<&Arc<V>> {
    self.value.as_ref()
  }

  /// Returns the absolute expiry, or `None` if the entry never expires.
  #[inline]
  pub fn expires_at(&self) -> Option<Instant> {
    self.expires_at
  }

  /// An entry without an expiry is never stale.
  #[inline]
  pub fn is_stale(&self, now: Instant) -> bool {
    match self.expires_at {
      Some(expires_at) => now >= expires_at,
      None => false,
    }
  }

  /// Returns true if the entry expired more than `grace` ago. A grace period
  /// reaching past the end of `Instant` never runs out.
  #[inline]
  pub(crate) fn is_past_grace(&self, now: Instant, grace: Duration) -> bool {
    match self.expires_at {
      Some(expires_at) => expires_at
        .checked_add(grace)
        .is_some_and(|limit| now >= limit),
      None => false,
    }
  }

  /// Converts the entry into the caller-facing result.
  #[inline]
  pub(crate) fn fetched(&self) -> Fetched<V> {
    match &self.value {
      Some(value) => Fetched::Value(value.clone()),
      None => Fetched::Absent,
    }
  }
}

// Manual impl so that `V` does not need to be `Clone`.
impl<V> Clone for Entry<V> {
  fn clone(&self) -> Self {
    Self {
      value: self.value.clone(),
      expires_at: self.expires_at,
    }
  }
}

impl<V> fmt::Debug for Entry<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Entry")
      .field("has_value", &self.value.is_some())
      .field("expires_at", &self.expires_at)
      .finish()
  }
}

/// The result of a `fetch`.
///
/// `Absent` and `NotComputed` are both "no value, no error" outcomes, kept
/// apart so callers can tell an empty answer from a failed or lost one.
pub enum Fetched<V> {
  /// A value was found in, or just computed into, the cache.
  Value(Arc<V>),
  /// The compute function reported that there is no value for this key.
  Absent,
  /// No value could be produced: the computation failed, or its result was
  /// evicted before this caller could read it.
  NotComputed,
}

impl<V> Fetched<V> {
  /// Returns a reference to the value, if any.
  pub fn value(&self) -> Option<&Arc<V>> {
    match self {
      Fetched::Value(value) => Some(value),
      _ => None,
    }
  }

  /// Consumes the result, returning the value if any.
  pub fn into_value(self) -> Option<Arc<V>> {
    match self {
      Fetched::Value(value) => Some(value),
      _ => None,
    }
  }

  pub fn is_value(&self) -> bool {
    matches!(self, Fetched::Value(_))
  }

  pub fn is_absent(&self) -> bool {
    matches!(self, Fetched::Absent)
  }

  pub fn is_not_computed(&self) -> bool {
    matches!(self, Fetched::NotComputed)
  }
}

impl<V> Clone for Fetched<V> {
  fn clone(&self) -> Self {
    match self {
      Fetched::Value(value) => Fetched::Value(value.clone()),
      Fetched::Absent => Fetched::Absent,
      Fetched::NotComputed => Fetched::NotComputed,
    }
  }
}

impl<V: fmt::Debug> fmt::Debug for Fetched<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Fetched::Value(value) => f.debug_tuple("Value").field(value).finish(),
      Fetched::Absent => f.write_str("Absent"),
      Fetched::NotComputed => f.write_str("NotComputed"),
    }
  }
}

impl<V: PartialEq> PartialEq for Fetched<V> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Fetched::Value(a), Fetched::Value(b)) => a == b,
      (Fetched::Absent, Fetched::Absent) => true,
      (Fetched::NotComputed, Fetched::NotComputed) => true,
      _ => false,
    }
  }
}
