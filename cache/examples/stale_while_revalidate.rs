use fibre_swr::{CacheBuilder, Fetched, Ttl};
use std::io;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Data {
  version: usize,
  content: String,
}

fn loader(
  counter: &Arc<AtomicUsize>,
  key: &str,
) -> impl FnOnce() -> io::Result<Option<Data>> + Send + 'static {
  let counter = counter.clone();
  let key = key.to_string();
  move || {
    let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
    println!("[Compute] Loading version {} for key '{}'...", version, key);
    thread::sleep(Duration::from_millis(500)); // Simulate slow load
    Ok(Some(Data {
      version,
      content: format!("Content for {} - version {}", key, version),
    }))
  }
}

fn version(fetched: &Fetched<Data>) -> usize {
  fetched.value().map(|data| data.version).unwrap_or(0)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let load_counter = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::default()
    .capacity(100)
    .default_ttl_std(Duration::from_secs(2))
    .jitter(Duration::from_millis(100))
    .build()
    .unwrap();

  let key = "my-data";

  println!("--- Step 1: Initial Load ---");
  let value1 = cache.fetch(key, Ttl::Default, loader(&load_counter, key));
  println!("Received: {:?}", value1);
  assert_eq!(version(&value1), 1);

  println!("\n--- Step 2: Cache Hit (Fresh) ---");
  let value2 = cache.fetch(key, Ttl::Default, loader(&load_counter, key));
  println!("Received: {:?}", value2);
  assert_eq!(version(&value2), 1);
  assert_eq!(load_counter.load(Ordering::SeqCst), 1);

  println!("\n--- Step 3: Wait for TTL to expire (3 seconds) ---");
  thread::sleep(Duration::from_secs(3));

  println!("\n--- Step 4: Stale Read ---");
  let value3 = cache.fetch(key, Ttl::Default, loader(&load_counter, key));
  println!("Received stale value immediately: {:?}", value3);
  assert_eq!(version(&value3), 1);
  println!("Refresh pending: {}", cache.is_pending(&key));

  println!("\n--- Step 5: Wait for the refresh to land ---");
  thread::sleep(Duration::from_secs(1));
  let value4 = cache.fetch(key, Ttl::Default, loader(&load_counter, key));
  println!("Received: {:?}", value4);
  assert_eq!(version(&value4), 2);

  println!("\nFinal metrics: {:#?}", cache.metrics());
}
