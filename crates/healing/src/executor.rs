use async_trait::async_trait;
use aide_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::extract::extract_script;
use crate::runner::ScriptRunner;

pub const SYSTEM_PROMPT: &str = "You are a Python Automation Engineer. Write a standalone Python script to perform the task.
- ONLY the code, no markdown, no explanation.
- Print results clearly.
- If you are fixing a previous error, analyze the error message and avoid the mistake.";

/// Text-in, text-out model call used to write scripts.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HealingReport {
    /// Stdout of the successful run.
    pub output: String,
    /// 1-based count of attempts used.
    pub attempts: u32,
    pub script: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Success,
    Failure,
}

/// Lives only for one `run` call.
struct ExecutionAttempt {
    index: u32,
    /// Empty when generation itself failed.
    script: String,
    outcome: AttemptOutcome,
    error_text: Option<String>,
}

fn summarize(history: &[ExecutionAttempt]) -> String {
    history
        .iter()
        .map(|a| {
            let lines = a.script.lines().count();
            match (a.outcome, &a.error_text) {
                (AttemptOutcome::Success, _) => format!("#{} ok ({} lines)", a.index + 1, lines),
                (AttemptOutcome::Failure, Some(e)) => {
                    format!("#{} failed ({} lines): {}", a.index + 1, lines, e)
                }
                (AttemptOutcome::Failure, None) => format!("#{} failed ({} lines)", a.index + 1, lines),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn build_prompt(task_description: &str, last_error: Option<&str>) -> String {
    match last_error {
        None => task_description.to_string(),
        Some(err) => format!(
            "Previous script failed with error: {}. Please provide a fixed version.\nOriginal Task: {}",
            err, task_description
        ),
    }
}

/// Generate, run, and on failure regenerate with the error fed back, up to a
/// fixed number of attempts.
pub struct SelfHealingExecutor {
    generator: Arc<dyn ScriptGenerator>,
    runner: Arc<dyn ScriptRunner>,
}

impl SelfHealingExecutor {
    pub fn new(generator: Arc<dyn ScriptGenerator>, runner: Arc<dyn ScriptRunner>) -> Self {
        Self { generator, runner }
    }

    pub async fn run(&self, task_description: &str, max_attempts: u32) -> Result<HealingReport> {
        if max_attempts == 0 {
            return Err(Error::Validation("max_attempts must be at least 1".to_string()));
        }

        let mut history: Vec<ExecutionAttempt> = Vec::new();
        let mut last_error: Option<String> = None;

        for index in 0..max_attempts {
            let prompt = build_prompt(task_description, last_error.as_deref());

            let script = match self.generator.generate(SYSTEM_PROMPT, &prompt).await {
                Ok(reply) => extract_script(&reply),
                Err(e) => {
                    warn!(attempt = index + 1, error = %e, "Script generation failed");
                    last_error = Some(e.to_string());
                    history.push(ExecutionAttempt {
                        index,
                        script: String::new(),
                        outcome: AttemptOutcome::Failure,
                        error_text: last_error.clone(),
                    });
                    continue;
                }
            };

            if script.is_empty() {
                warn!(attempt = index + 1, "Model returned an empty script");
                last_error = Some("the model returned no code".to_string());
                history.push(ExecutionAttempt {
                    index,
                    script: String::new(),
                    outcome: AttemptOutcome::Failure,
                    error_text: last_error.clone(),
                });
                continue;
            }

            info!(attempt = index + 1, max_attempts, script_len = script.len(), "🛠️ Executing generated script");

            match self.runner.run(&script).await {
                Ok(output) => {
                    history.push(ExecutionAttempt {
                        index,
                        script: script.clone(),
                        outcome: AttemptOutcome::Success,
                        error_text: None,
                    });
                    debug!(history = %summarize(&history), "Self-healing session finished");
                    info!(attempt = index + 1, "✅ Script succeeded");
                    return Ok(HealingReport {
                        output: output.stdout,
                        attempts: index + 1,
                        script,
                    });
                }
                Err(e) => {
                    warn!(attempt = index + 1, error = %e, "Script failed, retrying");
                    last_error = Some(e.to_string());
                    history.push(ExecutionAttempt {
                        index,
                        script,
                        outcome: AttemptOutcome::Failure,
                        error_text: last_error.clone(),
                    });
                }
            }
        }

        debug!(history = %summarize(&history), "Self-healing session exhausted");
        Err(Error::RetriesExhausted {
            attempts: max_attempts,
            last_error: last_error.unwrap_or_default(),
        })
    }
}
