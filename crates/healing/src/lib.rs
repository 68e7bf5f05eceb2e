pub mod executor;
pub mod extract;
pub mod runner;

pub use executor::{HealingReport, ScriptGenerator, SelfHealingExecutor, SYSTEM_PROMPT};
pub use extract::extract_script;
pub use runner::{ProcessRunner, RunOutput, ScriptRunner};
