use std::time::{Duration, Instant};

use chrono::TimeDelta;
use rand::Rng;

/// The time-to-live requested for a single `fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
  /// Use the cache's default TTL. A cache without a default never expires
  /// entries stored this way.
  #[default]
  Default,
  /// The stored entry never goes stale.
  Never,
  /// The stored entry goes stale after this duration plus jitter.
  For(Duration),
}

impl From<Duration> for Ttl {
  /// A zero duration falls back to the cache default.
  fn from(duration: Duration) -> Self {
    if duration.is_zero() {
      Ttl::Default
    } else {
      Ttl::For(duration)
    }
  }
}

impl From<TimeDelta> for Ttl {
  /// Signed convention: negative never expires, zero uses the default,
  /// positive is an explicit TTL.
  fn from(delta: TimeDelta) -> Self {
    if delta < TimeDelta::zero() {
      Ttl::Never
    } else {
      match delta.to_std() {
        Ok(duration) => Ttl::from(duration),
        Err(_) => Ttl::Never,
      }
    }
  }
}

/// Computes absolute expiry times from per-call TTLs, the cache default and
/// the jitter window.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Expiry {
  default_ttl: Option<Duration>,
  jitter: Duration,
}

impl Expiry {
  /// `default_ttl` of `None` (or zero) means entries without an explicit
  /// TTL never expire.
  pub(crate) fn new(default_ttl: Option<Duration>, jitter: Duration) -> Self {
    Self {
      default_ttl: default_ttl.filter(|ttl| !ttl.is_zero()),
      jitter,
    }
  }

  pub(crate) fn default_ttl(&self) -> Option<Duration> {
    self.default_ttl
  }

  pub(crate) fn jitter(&self) -> Duration {
    self.jitter
  }

  /// Returns the expiry for an entry stored at `now`, or `None` if it never
  /// expires. A TTL too large to represent as an `Instant` never expires.
  pub(crate) fn expires_at(&self, ttl: Ttl, now: Instant) -> Option<Instant> {
    let ttl = match ttl {
      Ttl::Never => return None,
      Ttl::For(duration) if !duration.is_zero() => duration,
      Ttl::For(_) | Ttl::Default => self.default_ttl?,
    };
    now
      .checked_add(ttl)
      .and_then(|at| at.checked_add(self.sample_jitter()))
  }

  /// Uniform in `[0, jitter)`. A zero window yields no jitter.
  fn sample_jitter(&self) -> Duration {
    let window = self.jitter.as_nanos().min(u64::MAX as u128) as u64;
    if window == 0 {
      return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..window))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SEC: Duration = Duration::from_secs(1);
  const JITTER: Duration = Duration::from_millis(100);

  #[test]
  fn negative_override_never_expires() {
    let expiry = Expiry::new(Some(5 * SEC), JITTER);
    assert_eq!(expiry.expires_at(Ttl::Never, Instant::now()), None);
    assert_eq!(Ttl::from(TimeDelta::seconds(-1)), Ttl::Never);
  }

  #[test]
  fn positive_override_wins_over_default() {
    let expiry = Expiry::new(Some(5 * SEC), JITTER);
    let now = Instant::now();
    let at = expiry.expires_at(Ttl::For(SEC), now).unwrap();
    assert!(at >= now + SEC);
    assert!(at < now + SEC + JITTER);
  }

  #[test]
  fn default_ttl_applies_to_zero_override() {
    let expiry = Expiry::new(Some(5 * SEC), JITTER);
    let now = Instant::now();
    let at = expiry.expires_at(Ttl::Default, now).unwrap();
    assert!(at >= now + 5 * SEC);
    assert!(at < now + 5 * SEC + JITTER);

    assert_eq!(Ttl::from(Duration::ZERO), Ttl::Default);
    assert_eq!(Ttl::from(TimeDelta::zero()), Ttl::Default);
    let at = expiry.expires_at(Ttl::For(Duration::ZERO), now).unwrap();
    assert!(at >= now + 5 * SEC);
  }

  #[test]
  fn no_default_means_never_expires() {
    let expiry = Expiry::new(None, JITTER);
    assert_eq!(expiry.expires_at(Ttl::Default, Instant::now()), None);

    let expiry = Expiry::new(Some(Duration::ZERO), JITTER);
    assert_eq!(expiry.default_ttl(), None);
    assert_eq!(expiry.expires_at(Ttl::Default, Instant::now()), None);
  }

  #[test]
  fn zero_jitter_window_adds_nothing() {
    let expiry = Expiry::new(Some(SEC), Duration::ZERO);
    let now = Instant::now();
    for _ in 0..32 {
      assert_eq!(expiry.expires_at(Ttl::Default, now), Some(now + SEC));
    }
  }

  #[test]
  fn unrepresentable_ttl_never_expires() {
    let now = Instant::now();
    let expiry = Expiry::new(Some(5 * SEC), JITTER);
    assert_eq!(expiry.expires_at(Ttl::For(Duration::MAX), now), None);

    let expiry = Expiry::new(Some(Duration::MAX), Duration::MAX);
    assert_eq!(expiry.expires_at(Ttl::Default, now), None);
    assert_eq!(Ttl::from(TimeDelta::MAX), Ttl::For(TimeDelta::MAX.to_std().unwrap()));
  }

  #[test]
  fn signed_delta_maps_to_explicit_ttl() {
    assert_eq!(
      Ttl::from(TimeDelta::milliseconds(1500)),
      Ttl::For(Duration::from_millis(1500))
    );
  }
}
