use aide_agent::{build_dispatcher, estimated_cost};
use aide_capabilities::Activation;
use aide_core::{CapabilityName, Config, Paths};

pub async fn list() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    println!("{:<12} {:<10} Activated by", "Capability", "Est. MB");
    println!("{}", "-".repeat(50));
    for name in CapabilityName::ALL {
        let activated_by = match name {
            CapabilityName::Code | CapabilityName::Automation => {
                format!("{} + {}", config.healing.interpreter, config.healing_model())
            }
            _ => config.agents.defaults.model.clone(),
        };
        println!("{:<12} {:<10} {}", name, estimated_cost(name), activated_by);
    }
    Ok(())
}

/// Activate one module and tear it down again.
pub async fn check(name: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let dispatcher = build_dispatcher(&config, &paths);
    let registry = dispatcher.registry();

    match registry.ensure_active(name).await? {
        Activation::Activated => println!("✓ {} activated", name),
        Activation::AlreadyActive => println!("✓ {} already active", name),
    }
    registry.deactivate(name).await?;
    println!("✓ {} torn down", name);
    Ok(())
}
