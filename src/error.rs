use thiserror::Error;

/// Errors that can occur while constructing a [`Pool`](crate::Pool).
///
/// Submission never produces an error: a rejected submission is reported as
/// `false`, and a task that panics is absorbed by the pool.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
  #[error("Requested capacity {requested} exceeds the maximum of {max} concurrent slots")]
  CapacityTooLarge { requested: usize, max: usize },

  #[error("No Tokio runtime is available to spawn pool tasks on")]
  NoRuntime,
}
