use parking_lot::Once;
use tokio_util::sync::CancellationToken;

/// One-shot, irreversible "closed" signal.
///
/// The token can be awaited alongside other branches of a `select!`; the
/// `Once` makes sure the transition (and whatever runs with it) happens a
/// single time no matter how many callers race on [`CloseLatch::trigger`].
#[derive(Debug)]
pub(crate) struct CloseLatch {
  token: CancellationToken,
  once: Once,
}

impl CloseLatch {
  pub(crate) fn new() -> Self {
    Self {
      token: CancellationToken::new(),
      once: Once::new(),
    }
  }

  /// Fires the latch. Returns `true` only for the call that performed the
  /// transition; `on_close` runs on that call alone, before waiters wake.
  pub(crate) fn trigger(&self, on_close: impl FnOnce()) -> bool {
    let mut fired = false;
    self.once.call_once(|| {
      on_close();
      self.token.cancel();
      fired = true;
    });
    fired
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.token.is_cancelled()
  }

  pub(crate) async fn closed(&self) {
    self.token.cancelled().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn trigger_is_idempotent() {
    let latch = CloseLatch::new();
    assert!(!latch.is_closed());
    assert!(latch.trigger(|| {}));
    assert!(latch.is_closed());
    assert!(!latch.trigger(|| panic!("latch fired twice")));
    assert!(latch.is_closed());
  }

  #[test]
  fn concurrent_triggers_transition_once() {
    let latch = Arc::new(CloseLatch::new());
    let transitions = Arc::new(AtomicUsize::new(0));
    let side_effects = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..16)
      .map(|_| {
        let latch = latch.clone();
        let transitions = transitions.clone();
        let side_effects = side_effects.clone();
        std::thread::spawn(move || {
          if latch.trigger(|| {
            side_effects.fetch_add(1, Ordering::SeqCst);
          }) {
            transitions.fetch_add(1, Ordering::SeqCst);
          }
        })
      })
      .collect();

    for t in threads {
      t.join().unwrap();
    }

    assert_eq!(transitions.load(Ordering::SeqCst), 1);
    assert_eq!(side_effects.load(Ordering::SeqCst), 1);
    assert!(latch.is_closed());
  }

  #[tokio::test]
  async fn closed_resolves_after_trigger() {
    let latch = Arc::new(CloseLatch::new());
    let waiter = {
      let latch = latch.clone();
      tokio::spawn(async move { latch.closed().await })
    };
    latch.trigger(|| {});
    waiter.await.unwrap();
  }
}
