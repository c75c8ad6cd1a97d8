use thiserror::Error;

/// The boxed error type every `compute` failure is converted into.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with a capacity of zero. Every cache is bounded.
  #[error("bounded cache capacity cannot be zero")]
  ZeroCapacity,
  /// The default time-to-live was negative. Use a per-call `Ttl::Never` to
  /// keep individual entries forever.
  #[error("can't expire entries with a negative default ttl")]
  NegativeDefaultTtl,
  /// `build_async` was called without a `TaskSpawner`, and no Tokio runtime
  /// was available to fall back on.
  #[error("an async cache requires a task spawner or a running tokio runtime")]
  SpawnerRequired,
}

/// A failure reported by a `compute` function.
///
/// It never travels back through `fetch`; it is handed to the per-call or
/// default error handler inside the background execution unit.
#[derive(Debug, Error)]
#[error("compute failed: {source}")]
pub struct ComputeError {
  #[source]
  source: BoxError,
}

impl ComputeError {
  pub(crate) fn new(source: BoxError) -> Self {
    Self { source }
  }

  /// Returns the error produced by the compute function.
  pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
    self.source.as_ref()
  }

  /// Consumes this error, returning the boxed compute failure.
  pub fn into_inner(self) -> BoxError {
    self.source
  }
}

/// Errors returned by a [`CacheRegistry`](crate::CacheRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
  /// No cache has been registered under this name.
  #[error("cache {0} is not initialized")]
  NotInitialized(String),
  /// The synchronous compute function failed.
  #[error("compute failed: {0}")]
  Compute(#[source] BoxError),
}
