//! A bounded, concurrent stale-while-revalidate cache with sync and async
//! front-ends.
//!
//! # Features
//! - **Stale-While-Revalidate**: Expired entries are served immediately while
//!   a single background refresh recomputes them.
//! - **Single-Flight Loading**: Concurrent misses for one key share a single
//!   computation.
//! - **Bounded**: Entries live in a fixed-capacity ARC store, and background
//!   computations are admitted through a bounded intake queue.
//! - **Jittered TTLs**: Every finite TTL gets a random offset so keys stored
//!   together do not expire together.
//! - **Sync & Async**: `Cache` runs computations on OS threads, `AsyncCache`
//!   on a `TaskSpawner`; `SyncCache` computes inline.
//! - **Observability**: Exposes detailed metrics and `tracing` events.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod sync_cache;
pub mod ttl;

// Internal, crate-only modules
mod dispatch;
mod entry;
mod inflight;
mod shared;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use entry::{Entry, Fetched};
pub use error::{BoxError, BuildError, ComputeError, RegistryError};
pub use handles::{AsyncCache, Cache};
pub use metrics::MetricsSnapshot;
pub use registry::CacheRegistry;
pub use runtime::TaskSpawner;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use shared::ErrorHandler;
pub use store::{ArcStore, BoundedStore};
pub use sync_cache::SyncCache;
pub use ttl::Ttl;
