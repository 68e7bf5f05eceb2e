use async_trait::async_trait;
use aide_core::config::HealingConfig;
use aide_core::{Error, Paths, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

const MAX_OUTPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs one script to completion.
///
/// `Ok` only on exit status 0. A non-zero exit is `ExecutionNonZeroExit`,
/// a blown deadline is `ExecutionTimeout`.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str) -> Result<RunOutput>;
}

fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (output truncated)", &s[..end])
}

/// Writes the script to a single-use file under the scratch dir and runs it
/// with an external interpreter. The file is removed after every run.
pub struct ProcessRunner {
    interpreter: String,
    extension: String,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(interpreter: &str, extension: &str, scratch_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
            scratch_dir,
            timeout,
        }
    }

    pub fn from_config(config: &HealingConfig, paths: &Paths) -> Self {
        Self::new(
            &config.interpreter,
            &config.script_extension,
            paths.scratch_dir(),
            Duration::from_secs(config.exec_timeout_secs),
        )
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    async fn execute(&self, path: &std::path::Path) -> Result<RunOutput> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(path)
            .current_dir(&self.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let stdout = safe_truncate(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_CHARS);
                let stderr = safe_truncate(&String::from_utf8_lossy(&output.stderr), MAX_OUTPUT_CHARS);
                if output.status.success() {
                    Ok(RunOutput { stdout, stderr })
                } else {
                    Err(Error::ExecutionNonZeroExit {
                        code: output.status.code(),
                        stderr: if stderr.trim().is_empty() { stdout } else { stderr },
                    })
                }
            }
            Ok(Err(e)) => Err(Error::Other(format!(
                "Failed to run interpreter '{}': {}",
                self.interpreter, e
            ))),
            Err(_) => Err(Error::ExecutionTimeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, script: &str) -> Result<RunOutput> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let mut file = tempfile::Builder::new()
            .prefix("aide_script_")
            .suffix(&format!(".{}", self.extension))
            .tempfile_in(&self.scratch_dir)?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        debug!(path = %file.path().display(), interpreter = %self.interpreter, "Running script");
        let result = self.execute(file.path()).await;

        if let Err(e) = file.close() {
            warn!(error = %e, "Failed to remove temporary script");
        }
        result
    }
}
