//! Command-line front end: run a simulation from a JSON config to its frame
//! limit, reporting progress.

use std::time::Duration;

use orchestrator::{create_simulation, RunnerState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orchestrator=info,solver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/two_blocks.json".to_string());

    let runner = create_simulation(&config_path)?;
    runner.start();

    loop {
        std::thread::sleep(Duration::from_millis(500));
        let diag = runner.diagnostics();
        tracing::info!(
            frame = diag.frame,
            used_buckets = diag.used_buckets,
            max_bucket = diag.max_bucket_count,
            acceptance = diag.acceptance_rate(),
            "status"
        );
        if runner.state() == RunnerState::Finished {
            break;
        }
    }

    runner.join()?;
    Ok(())
}
