use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-provider proxy. `Some("")` forces a direct connection.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    /// 显式指定 LLM provider（可选）
    /// 如果不指定，将从 model 字符串前缀推断
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "groq/llama-3.3-70b-versatile".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesConfig {
    /// Seconds between idle reaper passes.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
    /// A module unused for longer than this is deactivated.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_reap_interval() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    600
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: default_reap_interval(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,
    /// Interpreter used to run generated scripts.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// File extension given to the temporary script.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    #[serde(default = "default_healing_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_healing_temperature")]
    pub temperature: f32,
    /// 代码生成专用模型（为 None 时使用主模型）
    #[serde(default)]
    pub model: Option<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_exec_timeout() -> u64 {
    30
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_healing_max_tokens() -> u32 {
    2000
}

fn default_healing_temperature() -> f32 {
    0.1
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            exec_timeout_secs: default_exec_timeout(),
            interpreter: default_interpreter(),
            script_extension: default_script_extension(),
            max_tokens: default_healing_max_tokens(),
            temperature: default_healing_temperature(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub healing: HealingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("groq".to_string(), ProviderConfig {
            api_key: String::new(),
            api_base: Some("https://api.groq.com/openai/v1".to_string()),
            proxy: None,
        });
        providers.insert("openai".to_string(), ProviderConfig::default());
        providers.insert("openrouter".to_string(), ProviderConfig {
            api_key: String::new(),
            api_base: Some("https://openrouter.ai/api/v1".to_string()),
            proxy: None,
        });
        providers.insert("deepseek".to_string(), ProviderConfig::default());
        providers.insert("ollama".to_string(), ProviderConfig {
            api_key: "ollama".to_string(),
            api_base: Some("http://localhost:11434/v1".to_string()),
            proxy: None,
        });

        Self {
            providers,
            agents: AgentsConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            scheduler: SchedulerConfig::default(),
            healing: HealingConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Model used for script generation.
    pub fn healing_model(&self) -> &str {
        self.healing
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.agents.defaults.model)
    }
}
