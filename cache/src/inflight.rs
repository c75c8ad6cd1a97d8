use std::collections::VecDeque;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

use ahash::HashMap;
use parking_lot::Mutex;

use crate::metrics::Metrics;

/// How a computation ended. Carried by its completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
  /// A value (or a cacheable absence) was written to the store.
  Stored,
  /// The compute function returned no value and absences are not cached.
  Discarded,
  /// The compute function failed or never finished.
  Failed,
}

/// Represents a waiter parked on a `Completion`.
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

enum State {
  Pending,
  Fired(Outcome),
}

struct Inner {
  state: State,
  waiters: VecDeque<Waiter>,
}

/// A one-shot completion signal for a pending computation.
///
/// Any number of blocked threads and async tasks may wait on it at once.
/// Only the first `fire` has an effect.
pub(crate) struct Completion {
  inner: Mutex<Inner>,
}

impl Completion {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Pending,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Fires the signal and wakes every waiter. Returns `false` if it had
  /// already fired.
  pub(crate) fn fire(&self, outcome: Outcome) -> bool {
    let waiters = {
      let mut inner = self.inner.lock();
      if let State::Fired(_) = inner.state {
        return false;
      }
      inner.state = State::Fired(outcome);
      std::mem::take(&mut inner.waiters)
    };
    for waiter in waiters {
      waiter.wake();
    }
    true
  }

  #[cfg(test)]
  pub(crate) fn outcome(&self) -> Option<Outcome> {
    match self.inner.lock().state {
      State::Fired(outcome) => Some(outcome),
      State::Pending => None,
    }
  }

  #[cfg(test)]
  pub(crate) fn waiter_count(&self) -> usize {
    self.inner.lock().waiters.len()
  }

  /// Blocks the current thread until the signal fires.
  pub(crate) fn wait(&self) -> Outcome {
    let current = thread::current();
    loop {
      {
        let mut inner = self.inner.lock();
        if let State::Fired(outcome) = inner.state {
          return outcome;
        }
        // A spurious unpark finds this thread already queued.
        if !inner.waiters.iter().any(|w| match w {
          Waiter::Sync(thread) => thread.id() == current.id(),
          Waiter::Async(_) => false,
        }) {
          inner.waiters.push_back(Waiter::Sync(current.clone()));
        }
      }
      thread::park();
    }
  }
}

impl Future for &Completion {
  type Output = Outcome;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match inner.state {
      State::Fired(outcome) => Poll::Ready(outcome),
      State::Pending => {
        if !inner.waiters.iter().any(|w| match w {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        }) {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

/// Result of asking the registry for a computation.
pub(crate) enum Flight {
  /// Another caller already started one; wait on its signal.
  Joined(Arc<Completion>),
  /// This caller registered the computation and must now submit it.
  Started(Arc<Completion>),
  /// `admit` refused; nothing was registered.
  Declined,
}

/// Tracks which keys have a computation queued or executing.
///
/// A key is present exactly while one computation for it is outstanding. The
/// check-then-insert in `join_or_start` and the removal in `finish` share one
/// lock, so concurrent first-time callers agree on a single computation.
///
/// Nothing that can block on the dispatcher runs under that lock: the
/// dispatch thread itself calls `finish` when it drops a task unrun.
pub(crate) struct InFlight<K> {
  pending: Mutex<HashMap<K, Arc<Completion>>>,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
  pub(crate) fn new() -> Self {
    Self {
      pending: Mutex::new(HashMap::default()),
    }
  }

  /// Joins the pending computation for `key`, or registers a new one if
  /// `admit` allows it. `admit` runs under the registry lock and must not
  /// block. After `Started` the caller submits the task, and calls `finish`
  /// itself if the submit fails.
  pub(crate) fn join_or_start<F>(&self, key: &K, admit: F) -> Flight
  where
    F: FnOnce() -> bool,
  {
    let mut pending = self.pending.lock();
    if let Some(completion) = pending.get(key) {
      return Flight::Joined(completion.clone());
    }

    if !admit() {
      return Flight::Declined;
    }
    let completion = Arc::new(Completion::new());
    pending.insert(key.clone(), completion.clone());
    Flight::Started(completion)
  }

  /// Removes `key` and fires its signal. Called exactly once per started
  /// computation.
  pub(crate) fn finish(&self, key: &K, outcome: Outcome) {
    let completion = self.pending.lock().remove(key);
    if let Some(completion) = completion {
      completion.fire(outcome);
    }
  }

  pub(crate) fn is_pending(&self, key: &K) -> bool {
    self.pending.lock().contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.pending.lock().len()
  }
}

/// Finishes a started computation when dropped, so waiters are released even
/// if the compute function panics or its task is dropped unexecuted.
///
/// A guard dropped before `set_outcome` counts as a failed load.
pub(crate) struct FlightGuard<K: Eq + Hash + Clone> {
  inflight: Arc<InFlight<K>>,
  metrics: Arc<Metrics>,
  key: K,
  outcome: Option<Outcome>,
}

impl<K: Eq + Hash + Clone> FlightGuard<K> {
  pub(crate) fn new(inflight: Arc<InFlight<K>>, metrics: Arc<Metrics>, key: K) -> Self {
    Self {
      inflight,
      metrics,
      key,
      outcome: None,
    }
  }

  pub(crate) fn key(&self) -> &K {
    &self.key
  }

  pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
    self.outcome = Some(outcome);
  }
}

impl<K: Eq + Hash + Clone> Drop for FlightGuard<K> {
  fn drop(&mut self) {
    let outcome = match self.outcome {
      Some(outcome) => outcome,
      None => {
        Metrics::incr(&self.metrics.loads_failed);
        if thread::panicking() {
          tracing::warn!("compute panicked; releasing waiters");
        } else {
          tracing::warn!("computation dropped before finishing; releasing waiters");
        }
        Outcome::Failed
      }
    };
    self.inflight.finish(&self.key, outcome);
  }
}
