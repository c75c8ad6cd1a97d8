use crate::inflight::FlightGuard;
use crate::shared::{CacheCore, ComputeResult, ErrorHandler, Job, Task};
use crate::ttl::Ttl;

use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

/// Admits computations through a bounded intake queue and runs each one as
/// its own execution unit.
///
/// The queue bounds admission only: `submit` blocks while it is full, but
/// nothing limits how many admitted computations run at once.
pub(crate) struct Dispatcher<K: Send, V: Send> {
  intake: mpsc::BoundedSender<Task<K, V>>,
  // The thread exits once `intake`, the only sender, is dropped.
  _handle: JoinHandle<()>,
}

impl<K, V> Dispatcher<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Spawns the dispatch thread.
  pub(crate) fn spawn(core: Arc<CacheCore<K, V>>, queue_capacity: usize) -> Self {
    let (intake, rx): (
      mpsc::BoundedSender<Task<K, V>>,
      mpsc::BoundedReceiver<Task<K, V>>,
    ) = mpsc::bounded(queue_capacity.max(1));

    let handle = thread::spawn(move || {
      while let Ok(task) = rx.recv() {
        Self::execute(&core, task);
      }
      tracing::debug!("dispatcher intake closed, exiting");
    });

    Self {
      intake,
      _handle: handle,
    }
  }

  /// Queues a task, blocking while the intake is full. Returns `false` if the
  /// dispatcher is gone; the task is dropped unrun.
  ///
  /// Must not be called under the in-flight registry lock: the dispatch
  /// thread takes that lock whenever it drops a task without running it.
  pub(crate) fn submit(&self, task: Task<K, V>) -> bool {
    match self.intake.send(task) {
      Ok(()) => true,
      Err(err) => {
        tracing::error!(error = ?err, "dispatcher intake closed, computation dropped");
        false
      }
    }
  }

  fn execute(core: &Arc<CacheCore<K, V>>, task: Task<K, V>) {
    let Task {
      key,
      ttl,
      job,
      on_error,
    } = task;
    // From here on, dropping the guard is what releases the waiters.
    let guard = FlightGuard::new(
      Arc::clone(&core.inflight),
      Arc::clone(&core.metrics),
      key,
    );

    match job {
      Job::Blocking(compute) => {
        let core = Arc::clone(core);
        let spawned = thread::Builder::new()
          .name("fibre-swr-compute".to_string())
          .spawn(move || {
            let result = compute();
            Self::complete(&core, guard, ttl, on_error.as_ref(), result);
          });
        if let Err(err) = spawned {
          tracing::error!(error = %err, "failed to spawn compute thread");
        }
      }
      Job::Async(future) => match &core.spawner {
        Some(spawner) => {
          let core = Arc::clone(core);
          spawner.spawn(Box::pin(async move {
            let result = future.await;
            Self::complete(&core, guard, ttl, on_error.as_ref(), result);
          }));
        }
        None => {
          tracing::error!("async computation submitted without a task spawner");
          drop(guard);
        }
      },
    }
  }

  fn complete(
    core: &CacheCore<K, V>,
    mut guard: FlightGuard<K>,
    ttl: Ttl,
    on_error: Option<&ErrorHandler>,
    result: ComputeResult<V>,
  ) {
    let outcome = core.settle(guard.key(), ttl, result, on_error);
    tracing::debug!(?outcome, "computation finished");
    guard.set_outcome(outcome);
  }
}
