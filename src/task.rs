use std::sync::atomic::{AtomicI32, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

/// Sequence number assigned to each admitted task, starting at 1.
pub type TaskIndex = u64;

/// Counters shared between the pool handle and every task it dispatched.
///
/// The cells are independent; a reader may see `running` drop before
/// `worked` rises for the same task.
#[derive(Debug, Default)]
pub(crate) struct Counters {
  running: AtomicI32,
  worked: AtomicU64,
  index: AtomicU64,
  panicked: AtomicU64,
}

impl Counters {
  pub(crate) fn running(&self) -> i32 {
    self.running.load(AtomicOrdering::Acquire)
  }

  pub(crate) fn worked(&self) -> u64 {
    self.worked.load(AtomicOrdering::Acquire)
  }

  pub(crate) fn panicked(&self) -> u64 {
    self.panicked.load(AtomicOrdering::Acquire)
  }

  pub(crate) fn record_panic(&self) {
    self.panicked.fetch_add(1, AtomicOrdering::AcqRel);
  }
}

/// Owns one admitted slot for the lifetime of a dispatched task.
///
/// Dropping the guard decrements `running`, then releases the slot, then
/// increments `worked`. `running` drops before the slot is handed to the next
/// submitter, which keeps it within `[0, capacity]`. The spawned task owns
/// the guard, so this happens on normal completion, after a caught panic, and
/// when the runtime drops the task during its own shutdown.
#[derive(Debug)]
pub(crate) struct SlotGuard {
  permit: Option<OwnedSemaphorePermit>,
  counters: Arc<Counters>,
}

impl SlotGuard {
  /// Books a freshly reserved slot and allocates the task's sequence index.
  pub(crate) fn admit(permit: OwnedSemaphorePermit, counters: Arc<Counters>) -> (Self, TaskIndex) {
    counters.running.fetch_add(1, AtomicOrdering::AcqRel);
    let index = counters.index.fetch_add(1, AtomicOrdering::AcqRel) + 1;
    (
      Self {
        permit: Some(permit),
        counters,
      },
      index,
    )
  }
}

impl Drop for SlotGuard {
  fn drop(&mut self) {
    self.counters.running.fetch_sub(1, AtomicOrdering::AcqRel);
    drop(self.permit.take());
    self.counters.worked.fetch_add(1, AtomicOrdering::AcqRel);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::sync::Semaphore;

  #[test]
  fn admit_books_slot_and_drop_releases_it() {
    let semaphore = Arc::new(Semaphore::new(2));
    let counters = Arc::new(Counters::default());

    let permit = semaphore.clone().try_acquire_owned().unwrap();
    let (guard, index) = SlotGuard::admit(permit, counters.clone());
    assert_eq!(index, 1);
    assert_eq!(counters.running(), 1);
    assert_eq!(counters.worked(), 0);
    assert_eq!(semaphore.available_permits(), 1);

    drop(guard);
    assert_eq!(counters.running(), 0);
    assert_eq!(counters.worked(), 1);
    assert_eq!(semaphore.available_permits(), 2);
  }

  #[test]
  fn indices_increase_per_admission() {
    let semaphore = Arc::new(Semaphore::new(3));
    let counters = Arc::new(Counters::default());

    let indices: Vec<TaskIndex> = (0..3)
      .map(|_| {
        let permit = semaphore.clone().try_acquire_owned().unwrap();
        let (guard, index) = SlotGuard::admit(permit, counters.clone());
        drop(guard);
        index
      })
      .collect();

    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(counters.worked(), 3);
    assert_eq!(counters.running(), 0);
  }

  #[test]
  fn running_stays_within_capacity_when_slots_change_hands() {
    let semaphore = Arc::new(Semaphore::new(1));
    let counters = Arc::new(Counters::default());

    let threads: Vec<_> = (0..4)
      .map(|_| {
        let semaphore = semaphore.clone();
        let counters = counters.clone();
        std::thread::spawn(move || {
          let mut peak = 0;
          let mut admitted = 0;
          while admitted < 20_000 {
            if let Ok(permit) = semaphore.clone().try_acquire_owned() {
              let (guard, _) = SlotGuard::admit(permit, counters.clone());
              peak = peak.max(counters.running());
              drop(guard);
              admitted += 1;
            }
          }
          peak
        })
      })
      .collect();

    for t in threads {
      assert!(t.join().unwrap() <= 1);
    }
    assert_eq!(counters.running(), 0);
    assert_eq!(counters.worked(), 80_000);
  }
}
