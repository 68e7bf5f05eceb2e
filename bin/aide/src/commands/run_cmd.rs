use aide_agent::Runtime;
use aide_core::{Config, Paths};

/// Dispatch one command immediately, bypassing the scheduler.
pub async fn run(command: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let runtime = Runtime::new(&config, &paths);
    let output = runtime.dispatcher().dispatch(command).await?;
    println!("{}", output);
    Ok(())
}
