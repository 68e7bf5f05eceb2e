use aide_agent::Runtime;
use aide_core::{Config, Paths};
use tracing::{info, warn};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let runtime = Runtime::new(&config, &paths);
    let handles = runtime.start();
    info!(
        tasks_file = %paths.tasks_file().display(),
        sweep_interval_secs = config.scheduler.sweep_interval_secs,
        "aide daemon running, Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    runtime.shutdown();

    let graceful_timeout = std::time::Duration::from_secs(10);
    for handle in handles {
        match tokio::time::timeout(graceful_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Background loop ended abnormally"),
            Err(_) => warn!("Background loop did not stop in time"),
        }
    }

    for name in runtime.registry().names() {
        if let Err(e) = runtime.registry().deactivate(name.as_str()).await {
            warn!(capability = %name, error = %e, "Teardown on exit failed");
        }
    }

    info!("aide daemon stopped");
    Ok(())
}
