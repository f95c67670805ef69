use bee_pool::{CancellationToken, Pool};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let shutdown = CancellationToken::new();
  let pool = Pool::new(shutdown.clone(), 1).expect("Failed to create pool");

  let accepted = pool
    .run(|| async {
      info!("Panicking Task: Starting...");
      tokio::time::sleep(Duration::from_millis(100)).await;
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    })
    .await;
  info!("Panicking task accepted: {}", accepted);

  // The slot is released even though the task panicked.
  let accepted = pool
    .run_with_token(|token| async move {
      info!("Follow-up Task: Running until shutdown is requested...");
      token.cancelled().await;
      info!("Follow-up Task: Observed shutdown, exiting.");
    })
    .await;
  info!("Follow-up task accepted: {}", accepted);
  info!("Panicked so far: {}", pool.panicked());

  tokio::time::sleep(Duration::from_millis(100)).await;
  info!("Requesting shutdown through the cancellation token.");
  shutdown.cancel();

  let accepted = pool.run(|| async {}).await;
  info!("Submission after cancellation accepted: {} (closed: {})", accepted, pool.is_closed());

  while pool.running() > 0 {
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  info!("Worked: {}, panicked: {}", pool.worked(), pool.panicked());
  info!("--- Task Panic Example End ---");
}
