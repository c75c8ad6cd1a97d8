use fibre_swr::{CacheBuilder, CacheRegistry, RegistryError, Ttl};
use std::io;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let registry = CacheRegistry::new();
  registry.create(
    "sessions",
    CacheBuilder::new()
      .capacity(256)
      .default_ttl_std(Duration::from_secs(60)),
  )?;

  let session = registry.fetch("sessions", "abc", Ttl::Default, || {
    Ok::<_, io::Error>(Some("alice".to_string()))
  })?;
  println!("Session: {:?}", session);

  match registry.fetch("profiles", "abc", Ttl::Default, || {
    Ok::<_, io::Error>(Some("unused".to_string()))
  }) {
    Err(RegistryError::NotInitialized(name)) => println!("No cache named '{}'", name),
    other => println!("Unexpected: {:?}", other),
  }

  Ok(())
}
