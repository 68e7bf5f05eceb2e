use aide_agent::estimated_cost;
use aide_core::{CapabilityName, Config, Paths};
use aide_scheduler::{TaskStatus, TaskStore};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("aide status");
    println!("===========");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found, using defaults)" }
    );

    let config = Config::load_or_default(&paths)?;
    println!("Model:     {}", config.agents.defaults.model);
    println!("Healing:   {} (max {} attempts)", config.healing_model(), config.healing.max_attempts);
    println!();

    println!("Providers:");
    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();
    for name in names {
        let configured = config
            .get_provider(name)
            .map(|p| !p.api_key.is_empty())
            .unwrap_or(false);
        println!(
            "  {:<12} {}",
            name,
            if configured { "✓ configured" } else { "✗ no key" }
        );
    }
    println!();

    println!("Capabilities (idle timeout {}s):", config.capabilities.idle_timeout_secs);
    for name in CapabilityName::ALL {
        println!("  {:<12} ~{} MB", name, estimated_cost(name));
    }
    println!();

    let tasks = TaskStore::new(paths.tasks_file()).load().await?;
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    println!(
        "Tasks:     {} pending, {} completed, {} error",
        count(TaskStatus::Pending),
        count(TaskStatus::Completed),
        count(TaskStatus::Error)
    );
    Ok(())
}
