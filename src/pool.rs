use crate::error::PoolError;
use crate::latch::CloseLatch;
use crate::task::{Counters, SlotGuard, TaskIndex};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, Instrument};

const DEFAULT_POOL_NAME: &str = "pool";

/// A bounded-concurrency runner for fire-and-forget tasks.
///
/// At most `capacity` tasks run at once, each as its own Tokio task. A
/// submission waits until a slot frees up, the pool is closed, or the
/// external cancellation token fires, whichever comes first. Panics inside
/// a task are caught and discarded; the slot is released either way.
///
/// Cloning a `Pool` yields another handle to the same slots, signals and
/// counters.
#[derive(Debug, Clone)]
pub struct Pool {
  pool_name: Arc<String>,
  capacity: usize,
  cancel_token: CancellationToken,
  semaphore: Arc<Semaphore>,
  closed: Arc<CloseLatch>,
  counters: Arc<Counters>,
  tokio_handle: TokioHandle,
}

impl Pool {
  /// Creates a pool on the current Tokio runtime.
  ///
  /// `cancel_token` is the external shutdown signal: once it is cancelled,
  /// the next submission that observes it closes the pool. A `capacity` of
  /// zero is valid; such a pool never admits anything.
  ///
  /// # Errors
  /// Returns `PoolError::NoRuntime` when called outside a Tokio runtime and
  /// `PoolError::CapacityTooLarge` when `capacity` exceeds
  /// [`Semaphore::MAX_PERMITS`].
  pub fn new(cancel_token: CancellationToken, capacity: usize) -> Result<Self, PoolError> {
    let tokio_handle = TokioHandle::try_current().map_err(|_| PoolError::NoRuntime)?;
    Self::with_handle(cancel_token, capacity, tokio_handle, DEFAULT_POOL_NAME)
  }

  /// Creates a pool that spawns its tasks on `tokio_handle` and tags its log
  /// records with `pool_name`.
  pub fn with_handle(
    cancel_token: CancellationToken,
    capacity: usize,
    tokio_handle: TokioHandle,
    pool_name: &str,
  ) -> Result<Self, PoolError> {
    if capacity > Semaphore::MAX_PERMITS {
      return Err(PoolError::CapacityTooLarge {
        requested: capacity,
        max: Semaphore::MAX_PERMITS,
      });
    }

    debug!(%pool_name, capacity, "Creating pool.");

    Ok(Self {
      pool_name: Arc::new(pool_name.to_string()),
      capacity,
      cancel_token,
      semaphore: Arc::new(Semaphore::new(capacity)),
      closed: Arc::new(CloseLatch::new()),
      counters: Arc::new(Counters::default()),
      tokio_handle,
    })
  }

  /// The name attached to this pool's log records.
  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Maximum number of tasks allowed to run at once.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// The external cancellation token this pool observes.
  pub fn token(&self) -> &CancellationToken {
    &self.cancel_token
  }

  /// Runs `f` on the pool. See [`Pool::run_with_token_and_index`].
  pub async fn run<F, Fut>(&self, f: F) -> bool
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.run_with_token_and_index(move |_, _| f()).await
  }

  /// Runs `f` on the pool, handing it a clone of the pool's cancellation
  /// token so it can stop early on its own terms.
  pub async fn run_with_token<F, Fut>(&self, f: F) -> bool
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.run_with_token_and_index(move |token, _| f(token)).await
  }

  /// Submits `f` to the pool, handing it the pool's cancellation token and
  /// the task's sequence index.
  ///
  /// Waits until one of three things happens:
  /// - the external token is cancelled: the pool closes and `false` is
  ///   returned;
  /// - the pool is closed: `false` is returned;
  /// - a slot is free: the task is spawned and `true` is returned right away,
  ///   without waiting for it to start.
  ///
  /// The shutdown branches are polled before the slot, so a pool whose token
  /// is already cancelled never admits another task even with free slots.
  /// There is no timeout; race one against this future for fail-fast
  /// behaviour.
  pub async fn run_with_token_and_index<F, Fut>(&self, f: F) -> bool
  where
    F: FnOnce(CancellationToken, TaskIndex) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    tokio::select! {
      biased;

      _ = self.cancel_token.cancelled() => {
        self.close_with_cause("cancellation observed");
        trace!(pool_name = %*self.pool_name, "Submission rejected: cancellation token fired.");
        false
      }

      _ = self.closed.closed() => {
        trace!(pool_name = %*self.pool_name, "Submission rejected: pool is closed.");
        false
      }

      permit_acquisition_result = self.semaphore.clone().acquire_owned() => {
        match permit_acquisition_result {
          Ok(permit) => {
            self.dispatch(permit, f);
            true
          }
          // The pool never closes its semaphore; treated as shutdown if it ever happens.
          Err(_) => {
            error!(pool_name = %*self.pool_name, "Semaphore closed. Submission rejected.");
            false
          }
        }
      }
    }
  }

  /// Stops the pool from admitting further work. Idempotent.
  ///
  /// Submissions waiting for a slot resolve to `false`. Tasks already
  /// running are left alone.
  pub fn close(&self) {
    self.close_with_cause("explicit close");
  }

  /// Whether the pool has stopped admitting work.
  ///
  /// A cancelled token only counts once a submission has observed it.
  pub fn is_closed(&self) -> bool {
    self.closed.is_closed()
  }

  /// Snapshot of how many tasks are currently executing. Best-effort gauge.
  pub fn running(&self) -> i32 {
    self.counters.running()
  }

  /// Total tasks that have finished, including those that panicked.
  pub fn worked(&self) -> u64 {
    self.counters.worked()
  }

  /// Total tasks whose body panicked.
  pub fn panicked(&self) -> u64 {
    self.counters.panicked()
  }

  /// Free slots at this instant.
  pub fn available(&self) -> usize {
    self.semaphore.available_permits()
  }

  fn close_with_cause(&self, cause: &'static str) {
    let pool_name = &self.pool_name;
    self.closed.trigger(|| {
      info!(pool_name = %**pool_name, cause, "Pool closing. Further submissions will be rejected.");
    });
  }

  fn dispatch<F, Fut>(&self, permit: OwnedSemaphorePermit, f: F)
  where
    F: FnOnce(CancellationToken, TaskIndex) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let (slot, task_index) = SlotGuard::admit(permit, self.counters.clone());
    debug!(pool_name = %*self.pool_name, %task_index, "Slot reserved. Spawning task.");

    let task_token = self.cancel_token.clone();
    let counters = self.counters.clone();
    let pool_name_for_task = self.pool_name.clone();

    self.tokio_handle.spawn(
      async move {
        let _slot = slot;

        // The closure call sits inside the unwind boundary too, so a panic
        // while building the future is caught like one raised while polling it.
        let outcome = AssertUnwindSafe(async move { f(task_token, task_index).await })
          .catch_unwind()
          .await;

        match outcome {
          Ok(()) => trace!(pool_name = %*pool_name_for_task, %task_index, "Task finished."),
          Err(_panic_payload) => {
            counters.record_panic();
            debug!(pool_name = %*pool_name_for_task, %task_index, "Task panicked. Panic discarded.");
          }
        }
      }
      .instrument(info_span!("pool_task", pool_name = %*self.pool_name, %task_index)),
    );
  }
}
