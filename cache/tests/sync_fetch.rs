use fibre_swr::{CacheBuilder, ComputeError, Fetched, Ttl};
use std::io;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier, Mutex,
};
use std::thread;
use std::time::Duration;

fn counting(counter: &Arc<AtomicUsize>, value: u32) -> impl FnOnce() -> io::Result<Option<u32>> + Send + 'static {
  let counter = counter.clone();
  move || {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(Some(value))
  }
}

#[test]
fn test_sync_fetch_miss_then_hit() {
  let computes = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(10)
    .default_ttl_std(Duration::from_secs(60))
    .build()
    .unwrap();

  // 1. A miss runs the compute function and waits for it.
  let value = cache.fetch("k", Ttl::Default, counting(&computes, 1));
  assert_eq!(value, Fetched::Value(Arc::new(1)));
  assert_eq!(computes.load(Ordering::SeqCst), 1);

  // 2. A fresh hit never calls compute.
  let value = cache.fetch("k", Ttl::Default, counting(&computes, 2));
  assert_eq!(value, Fetched::Value(Arc::new(1)));
  assert_eq!(computes.load(Ordering::SeqCst), 1, "Fresh hit should not compute");

  let metrics = cache.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.loads_stored, 1);
  assert_eq!(cache.len(), 1);
  assert_eq!(cache.pending(), 0);
}

#[test]
fn test_sync_single_flight_under_contention() {
  let computes = Arc::new(AtomicUsize::new(0));
  let num_threads = 20;
  let cache = Arc::new(CacheBuilder::<u32, String>::new().capacity(10).build().unwrap());
  let barrier = Arc::new(Barrier::new(num_threads));

  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      let computes = computes.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.fetch(42u32, Ttl::Never, move || {
          computes.fetch_add(1, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(100));
          Ok::<_, io::Error>(Some("answer".to_string()))
        })
      })
    })
    .collect();

  for handle in handles {
    let value = handle.join().unwrap();
    assert_eq!(value.value().map(|v| v.as_str()), Some("answer"));
  }

  assert_eq!(
    computes.load(Ordering::SeqCst),
    1,
    "Concurrent misses should share one computation"
  );
  assert_eq!(cache.metrics().loads_started, 1);
  assert_eq!(cache.pending(), 0);
}

#[test]
fn test_sync_stale_while_revalidate_scenario() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(10)
    .default_ttl_std(Duration::from_secs(5))
    .jitter(Duration::from_millis(100))
    .build()
    .unwrap();
  let ok = |v: u32| move || Ok::<_, io::Error>(Some(v));

  assert_eq!(cache.fetch("k", Duration::from_secs(1), ok(1)), Fetched::Value(Arc::new(1)));
  assert_eq!(cache.fetch("k", Duration::from_secs(5), ok(2)), Fetched::Value(Arc::new(1)));

  thread::sleep(Duration::from_secs(2));
  // Stale: the old value comes back at once and a refresh is queued.
  assert_eq!(cache.fetch("k", Ttl::Default, ok(2)), Fetched::Value(Arc::new(1)));

  thread::sleep(Duration::from_secs(1));
  assert_eq!(cache.fetch("k", Ttl::Default, ok(3)), Fetched::Value(Arc::new(2)));
  assert_eq!(cache.metrics().stale_hits, 1);
}

#[test]
fn test_sync_stale_hit_does_not_wait_for_refresh() {
  let cache = CacheBuilder::<&str, u32>::new().capacity(4).build().unwrap();
  cache.fetch("k", Duration::from_millis(20), || Ok::<_, io::Error>(Some(1u32)));
  thread::sleep(Duration::from_millis(40));

  let started = std::time::Instant::now();
  let value = cache.fetch("k", Ttl::Never, || {
    thread::sleep(Duration::from_millis(300));
    Ok::<_, io::Error>(Some(2u32))
  });
  assert_eq!(value, Fetched::Value(Arc::new(1)));
  assert!(started.elapsed() < Duration::from_millis(200));
  assert!(cache.is_pending(&"k"));

  // A second stale hit while the refresh is pending does not queue another.
  let dropped = Arc::new(AtomicUsize::new(0));
  assert_eq!(cache.fetch("k", Ttl::Never, counting(&dropped, 9)), Fetched::Value(Arc::new(1)));

  thread::sleep(Duration::from_millis(500));
  assert_eq!(dropped.load(Ordering::SeqCst), 0);
  assert_eq!(cache.fetch("k", Ttl::Never, counting(&dropped, 9)), Fetched::Value(Arc::new(2)));
}

#[test]
fn test_sync_negative_ttl_never_expires() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .default_ttl_std(Duration::from_millis(10))
    .build()
    .unwrap();
  let computes = Arc::new(AtomicUsize::new(0));

  cache.fetch("k", chrono::TimeDelta::seconds(-1), counting(&computes, 1));
  thread::sleep(Duration::from_millis(50));
  assert_eq!(cache.fetch("k", Ttl::Default, counting(&computes, 2)), Fetched::Value(Arc::new(1)));
  assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sync_absent_results_are_not_cached_by_default() {
  let cache = CacheBuilder::<&str, u32>::new().capacity(4).build().unwrap();
  let computes = Arc::new(AtomicUsize::new(0));

  for _ in 0..2 {
    let computes = computes.clone();
    let value = cache.fetch("missing", Ttl::Default, move || {
      computes.fetch_add(1, Ordering::SeqCst);
      Ok::<_, io::Error>(None)
    });
    assert!(value.is_absent());
  }
  assert_eq!(computes.load(Ordering::SeqCst), 2);
  assert_eq!(cache.len(), 0);
}

#[test]
fn test_sync_absent_results_cached_when_enabled() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .cache_absent(true)
    .build()
    .unwrap();
  let computes = Arc::new(AtomicUsize::new(0));

  for _ in 0..2 {
    let computes = computes.clone();
    let value = cache.fetch("missing", Ttl::Default, move || {
      computes.fetch_add(1, Ordering::SeqCst);
      Ok::<_, io::Error>(None)
    });
    assert!(value.is_absent());
  }
  assert_eq!(computes.load(Ordering::SeqCst), 1);
  assert_eq!(cache.len(), 1);
}

#[test]
fn test_sync_capacity_is_never_exceeded() {
  let cache = CacheBuilder::<u32, u32>::new().capacity(8).build().unwrap();
  for key in 0..100u32 {
    let value = cache.fetch(key, Ttl::Never, move || Ok::<_, io::Error>(Some(key)));
    // Each result is read back right after it lands, before anything evicts it.
    assert_eq!(value, Fetched::Value(Arc::new(key)));
    assert!(cache.len() <= 8);
  }
  assert_eq!(cache.len(), 8);
  assert_eq!(cache.metrics().evicted_by_capacity, 92);
}

#[test]
fn test_sync_error_goes_to_per_call_handler() {
  let default_seen = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .on_error({
      let seen = default_seen.clone();
      move |err: &ComputeError| seen.lock().unwrap().push(err.inner().to_string())
    })
    .build()
    .unwrap();

  let call_seen = Arc::new(Mutex::new(Vec::new()));
  let value = cache.fetch_with_handler(
    "k",
    Ttl::Default,
    || Err::<Option<u32>, _>(io::Error::other("db down")),
    {
      let seen = call_seen.clone();
      move |err: &ComputeError| seen.lock().unwrap().push(err.inner().to_string())
    },
  );

  assert!(value.is_not_computed());
  assert_eq!(*call_seen.lock().unwrap(), vec!["db down".to_string()]);
  assert!(default_seen.lock().unwrap().is_empty());
  assert_eq!(cache.len(), 0);
}

#[test]
fn test_sync_error_falls_back_to_default_handler() {
  let seen = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .on_error({
      let seen = seen.clone();
      move |_: &ComputeError| {
        seen.fetch_add(1, Ordering::SeqCst);
      }
    })
    .build()
    .unwrap();

  let value = cache.fetch("k", Ttl::Default, || Err::<Option<u32>, _>(io::Error::other("boom")));
  assert_eq!(value, Fetched::NotComputed);
  assert_eq!(seen.load(Ordering::SeqCst), 1);
  assert_eq!(cache.metrics().loads_failed, 1);
}

#[test]
fn test_sync_failed_refresh_keeps_stale_value() {
  let cache = CacheBuilder::<&str, u32>::new().capacity(4).build().unwrap();
  cache.fetch("k", Duration::from_millis(20), || Ok::<_, io::Error>(Some(1)));
  thread::sleep(Duration::from_millis(40));

  let value = cache.fetch("k", Ttl::Default, || Err::<Option<u32>, _>(io::Error::other("boom")));
  assert_eq!(value, Fetched::Value(Arc::new(1)));

  thread::sleep(Duration::from_millis(100));
  assert_eq!(cache.pending(), 0);
  let value = cache.fetch("k", Ttl::Default, || Err::<Option<u32>, _>(io::Error::other("boom")));
  assert_eq!(value, Fetched::Value(Arc::new(1)));
}

#[test]
fn test_sync_entry_past_grace_is_a_miss() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .stale_grace(Duration::from_millis(50))
    .build()
    .unwrap();
  cache.fetch("k", Duration::from_millis(10), || Ok::<_, io::Error>(Some(1)));
  thread::sleep(Duration::from_millis(100));

  // Too old to serve: the caller waits for the new value.
  let value = cache.fetch("k", Ttl::Never, || Ok::<_, io::Error>(Some(2)));
  assert_eq!(value, Fetched::Value(Arc::new(2)));

  cache.fetch("j", Duration::from_millis(10), || Ok::<_, io::Error>(Some(1)));
  thread::sleep(Duration::from_millis(100));
  let value = cache.fetch("j", Ttl::Never, || Err::<Option<u32>, _>(io::Error::other("boom")));
  assert!(value.is_not_computed());
}

#[test]
fn test_sync_panicking_compute_releases_waiters() {
  let cache = Arc::new(CacheBuilder::<&str, u32>::new().capacity(4).build().unwrap());
  let barrier = Arc::new(Barrier::new(4));

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.fetch("k", Ttl::Default, || -> io::Result<Option<u32>> {
          thread::sleep(Duration::from_millis(50));
          panic!("compute blew up")
        })
      })
    })
    .collect();

  for handle in handles {
    assert!(handle.join().unwrap().is_not_computed());
  }
  assert_eq!(cache.pending(), 0);
  let metrics = cache.metrics();
  assert!(metrics.loads_started >= 1);
  assert_eq!(metrics.loads_failed, metrics.loads_started);
}

#[test]
fn test_sync_max_duration_ttl_never_expires() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .jitter(Duration::from_millis(100))
    .build()
    .unwrap();
  let computes = Arc::new(AtomicUsize::new(0));

  assert_eq!(cache.fetch("k", Duration::MAX, counting(&computes, 1)), Fetched::Value(Arc::new(1)));
  assert_eq!(cache.len(), 1);
  assert_eq!(cache.fetch("k", Ttl::Default, counting(&computes, 2)), Fetched::Value(Arc::new(1)));
  assert_eq!(computes.load(Ordering::SeqCst), 1);
  assert_eq!(cache.metrics().loads_failed, 0);

  let inline = CacheBuilder::<&str, u32>::new().capacity(4).build_sync_cache().unwrap();
  let value = inline
    .fetch("k", Ttl::For(Duration::MAX), || Ok::<_, io::Error>(Some(3)))
    .unwrap();
  assert_eq!(value, Fetched::Value(Arc::new(3)));
  let value = inline
    .fetch("k", Ttl::Default, || Ok::<_, io::Error>(Some(4)))
    .unwrap();
  assert_eq!(value, Fetched::Value(Arc::new(3)));
}

#[test]
fn test_sync_max_duration_grace_serves_stale() {
  let cache = CacheBuilder::<&str, u32>::new()
    .capacity(4)
    .stale_grace(Duration::MAX)
    .build()
    .unwrap();
  cache.fetch("k", Duration::from_millis(10), || Ok::<_, io::Error>(Some(1)));
  thread::sleep(Duration::from_millis(30));

  let value = cache.fetch("k", Ttl::Never, || Ok::<_, io::Error>(Some(2)));
  assert_eq!(value, Fetched::Value(Arc::new(1)));
  assert_eq!(cache.metrics().stale_hits, 1);
}
