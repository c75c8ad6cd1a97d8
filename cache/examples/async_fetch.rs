use fibre_swr::{CacheBuilder, ComputeError, Ttl};
use std::io;
use std::sync::Arc;
use std::time::Duration;

async fn fetch_user(id: u64) -> io::Result<Option<String>> {
  tokio::time::sleep(Duration::from_millis(50)).await;
  match id {
    0 => Err(io::Error::other("user service unavailable")),
    1..=100 => Ok(Some(format!("user-{id}"))),
    _ => Ok(None),
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cache = Arc::new(
    CacheBuilder::<u64, String>::new()
      .capacity(1_000)
      .default_ttl_std(Duration::from_secs(30))
      .jitter(Duration::from_secs(3))
      .cache_absent(true)
      .on_error(|err: &ComputeError| eprintln!("[on_error] {err}"))
      .build_async()
      .unwrap(),
  );

  // Ten concurrent callers, one computation.
  let mut tasks = Vec::new();
  for _ in 0..10 {
    let cache = cache.clone();
    tasks.push(tokio::spawn(async move {
      cache.fetch(7, Ttl::Default, || fetch_user(7)).await
    }));
  }
  for task in tasks {
    println!("Received: {:?}", task.await.unwrap());
  }

  let missing = cache.fetch(404, Ttl::Default, || fetch_user(404)).await;
  println!("Missing user: {:?}", missing);

  let failed = cache.fetch(0, Ttl::Default, || fetch_user(0)).await;
  println!("Failed lookup: {:?}", failed);

  println!("\nFinal metrics: {:#?}", cache.metrics());
}
