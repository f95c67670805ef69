use bee_pool::{CancellationToken, Pool};
use std::time::Duration;
use tracing::info;

async fn my_task_fn(index: u64, delay_ms: u64) {
  info!("Task {} starting, will sleep for {}ms", index, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  info!("Task {} finished after {}ms", index, delay_ms);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let pool = Pool::with_handle(
    CancellationToken::new(),
    2, // Concurrency limit
    tokio::runtime::Handle::current(),
    "basic_pool",
  )
  .expect("Failed to create pool");

  for i in 0..5u64 {
    // Alternate sleep times for variety
    let sleep_duration: u64 = 500 + (i % 3 * 250);
    let accepted = pool
      .run_with_token_and_index(move |_, index| my_task_fn(index, sleep_duration))
      .await;
    info!(
      "Submission {} accepted: {} (running: {}, worked: {})",
      i,
      accepted,
      pool.running(),
      pool.worked()
    );
  }

  info!("All tasks submitted. Waiting for them to drain...");
  while pool.worked() < 5 {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  pool.close();
  let accepted_after_close = pool.run(|| async {}).await;
  info!("Submission after close accepted: {}", accepted_after_close);
  info!("--- Basic Usage Example End ---");
}
