//! Service runner for the Stylus workbench.

use tracing::{error, info};
use workbench_runtime::api::api_router;
use workbench_runtime::config::WorkbenchConfig;
use workbench_runtime::workspace;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    setup_log();

    let config = WorkbenchConfig::load();
    info!(
        "workspace root: {} (sweep every {}s, max age {} min)",
        config.workspace_root.display(),
        config.sweep_interval.as_secs(),
        config.sweep_max_age_minutes
    );

    // Spawn sweep background task (stale workspace cleanup)
    {
        let interval_duration = config.sweep_interval;
        let max_age = config.sweep_max_age_minutes;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            loop {
                interval.tick().await;
                let removed =
                    match tokio::task::spawn_blocking(move || workspace::sweep(max_age)).await {
                        Ok(removed) => removed,
                        Err(err) => {
                            error!("sweep task panicked: {err}");
                            continue;
                        }
                    };
                if removed > 0 {
                    info!("sweep removed {removed} stale workspaces");
                }
            }
        });
    }

    let port = std::env::var("WORKBENCH_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting workbench API on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, api_router())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {err}");
        return;
    }
    info!("shutdown signal received");
}

fn setup_log() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {}
}
