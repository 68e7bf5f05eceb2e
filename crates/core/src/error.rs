use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    /// Name outside the fixed capability set, or not registered at startup.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Activation of '{capability}' failed: {cause}")]
    ActivationFailure { capability: String, cause: String },

    #[error("Task callback failed: {0}")]
    TaskCallbackFailure(String),

    #[error("Script timed out after {0} seconds")]
    ExecutionTimeout(u64),

    #[error("Script {}: {stderr}", exit_description(.code))]
    ExecutionNonZeroExit { code: Option<i32>, stderr: String },

    #[error("Giving up after {attempts} attempts. Last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was killed by a signal".to_string(),
    }
}

impl Error {
    /// Failures a single attempt of the repair loop can absorb and feed back.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Error::ExecutionTimeout(_) | Error::ExecutionNonZeroExit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
