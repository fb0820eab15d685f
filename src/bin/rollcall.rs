use anyhow::Result;
use rollcall::cli::{self, telemetry};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
