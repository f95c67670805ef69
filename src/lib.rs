//! A Tokio-based bounded-concurrency task runner with fire-and-forget
//! dispatch, panic isolation, and cooperative shutdown.

mod error;
mod latch;
mod pool;
mod task;

pub use error::PoolError;
pub use pool::Pool;
pub use task::TaskIndex;

pub use tokio_util::sync::CancellationToken;
