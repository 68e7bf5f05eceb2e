use aide_agent::ProviderScriptGenerator;
use aide_core::{Config, Paths};
use aide_healing::{ProcessRunner, SelfHealingExecutor};
use aide_providers::create_healing_provider;
use std::sync::Arc;

pub async fn run(description: &str, attempts: Option<u32>) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let provider = create_healing_provider(&config)?;
    let generator = Arc::new(ProviderScriptGenerator::new(Arc::from(provider)));
    let runner = Arc::new(ProcessRunner::from_config(&config.healing, &paths));
    let executor = SelfHealingExecutor::new(generator, runner);

    let max_attempts = attempts.unwrap_or(config.healing.max_attempts);
    println!("🔧 Running '{}' with up to {} attempt(s)...", description, max_attempts);

    let report = executor.run(description, max_attempts).await?;
    println!("✓ Succeeded on attempt {}", report.attempts);
    println!();
    println!("{}", report.output.trim_end());
    Ok(())
}
