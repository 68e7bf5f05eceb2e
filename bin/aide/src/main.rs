mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "aide")]
#[command(about = "On-demand capability orchestrator with scheduled and self-healing tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.aide with a default config
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show configuration, capabilities and task counts
    Status,

    /// Run the idle reaper and task scheduler until Ctrl+C
    Daemon,

    /// Dispatch one command now (e.g. "research: rust 2024 edition")
    Run {
        /// Command text, optionally prefixed with "<capability>:"
        command: String,
    },

    /// Manage scheduled tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },

    /// Generate and run a script, repairing it until it succeeds
    Heal {
        /// What the script should do
        description: String,

        /// Override healing.maxAttempts
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Inspect capability modules
    Capabilities {
        #[command(subcommand)]
        command: CapabilitiesCommands,
    },
}

#[derive(Subcommand)]
enum TasksCommands {
    /// List scheduled tasks in stored order
    List {
        /// Only show pending tasks
        #[arg(long)]
        pending: bool,
    },
    /// Schedule a task
    Add {
        /// Task description, optionally prefixed with "<capability>:"
        description: String,
        /// Local fire time, "YYYY-MM-DD HH:MM:SS"
        #[arg(long, conflicts_with = "delay")]
        at: Option<String>,
        /// Relative delay such as 90s, 10m, 2h, 1d
        #[arg(long = "in")]
        delay: Option<String>,
    },
}

#[derive(Subcommand)]
enum CapabilitiesCommands {
    /// List modules with their estimated cost
    List,
    /// Activate a module once and tear it down again
    Check {
        /// Capability name (vision, research, automation, art, code)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Daemon => {
            commands::daemon::run().await?;
        }
        Commands::Run { command } => {
            commands::run_cmd::run(&command).await?;
        }
        Commands::Tasks { command } => match command {
            TasksCommands::List { pending } => {
                commands::tasks_cmd::list(pending).await?;
            }
            TasksCommands::Add { description, at, delay } => {
                commands::tasks_cmd::add(&description, at, delay).await?;
            }
        },
        Commands::Heal { description, attempts } => {
            commands::heal::run(&description, attempts).await?;
        }
        Commands::Capabilities { command } => match command {
            CapabilitiesCommands::List => {
                commands::capabilities::list().await?;
            }
            CapabilitiesCommands::Check { name } => {
                commands::capabilities::check(&name).await?;
            }
        },
    }

    Ok(())
}
