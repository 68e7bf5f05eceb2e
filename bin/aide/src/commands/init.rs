use aide_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    paths.ensure_dirs()?;
    Config::default().save(&config_path)?;

    println!("✓ Created {}", config_path.display());
    println!("✓ Created {}", paths.scratch_dir().display());
    println!();
    println!("Next steps:");
    println!("  1. Add an API key under providers in {}", config_path.display());
    println!("  2. Run `aide capabilities check research` to verify it");
    println!("  3. Run `aide daemon` to start the scheduler");
    Ok(())
}
