use aide_core::config::ProviderConfig;
use aide_core::Config;

use crate::client::ProxySettings;
use crate::{OpenAIProvider, Provider};

/// Sampling parameters for one provider instance.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Sampling {
    pub fn chat(config: &Config) -> Self {
        Self {
            max_tokens: config.agents.defaults.max_tokens,
            temperature: config.agents.defaults.temperature,
        }
    }

    pub fn healing(config: &Config) -> Self {
        Self {
            max_tokens: config.healing.max_tokens,
            temperature: config.healing.temperature,
        }
    }
}

/// 默认的 OpenAI 兼容 provider 的 api_base
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "groq" => "https://api.groq.com/openai/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// 从 model 字符串前缀推断 provider 名字
/// 返回 None 表示无法从前缀推断（需要 fallback）
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("groq/") {
        Some("groq")
    } else if model.starts_with("ollama/") {
        Some("ollama")
    } else if model.starts_with("openrouter/") {
        Some("openrouter")
    } else if model.starts_with("deepseek") {
        Some("deepseek")
    } else if model.starts_with("openai/")
        || model.starts_with("gpt-")
        || model.starts_with("o1")
        || model.starts_with("o3")
    {
        Some("openai")
    } else {
        None
    }
}

/// Model id as the upstream expects it. OpenRouter ids keep their vendor
/// segment ("meta-llama/llama-3..."), everyone else drops the routing prefix.
fn upstream_model<'a>(provider_name: &str, model: &'a str) -> &'a str {
    let prefixed = format!("{}/", provider_name);
    model.strip_prefix(prefixed.as_str()).unwrap_or(model)
}

fn has_key(cfg: &ProviderConfig) -> bool {
    !cfg.api_key.is_empty() && cfg.api_key != "dummy"
}

/// 从 config 中找到第一个配置了 api_key 的 provider 名字作为 fallback
fn fallback_provider_name(config: &Config) -> Option<&'static str> {
    let priority = ["groq", "openai", "openrouter", "deepseek"];
    for name in priority {
        if config.providers.get(name).map(has_key).unwrap_or(false) {
            return Some(name);
        }
    }
    // ollama 不需要真实 api_key
    if config.providers.contains_key("ollama") {
        return Some("ollama");
    }
    None
}

/// 统一的 provider 创建入口。
///
/// 解析优先级：
/// 1. `explicit_provider`
/// 2. model 字符串前缀推断（如 "groq/llama-..." → groq）
/// 3. config 中第一个有效 api_key 的 provider
pub fn create_provider(
    config: &Config,
    model: &str,
    explicit_provider: Option<&str>,
    sampling: Sampling,
) -> anyhow::Result<Box<dyn Provider>> {
    let effective_provider: &str = if let Some(ep) = explicit_provider {
        ep
    } else if let Some(inferred) = infer_provider_from_model(model) {
        inferred
    } else if let Some(fallback) = fallback_provider_name(config) {
        fallback
    } else {
        return Err(anyhow::anyhow!(
            "No LLM provider configured. Set 'provider' in config, use a recognized model prefix \
             (e.g. 'groq/llama-3.3-70b-versatile', 'gpt-4o'), or add an API key to the providers section."
        ));
    };

    let provider_cfg = config.providers.get(effective_provider);

    if effective_provider != "ollama" {
        match provider_cfg {
            None => {
                return Err(anyhow::anyhow!(
                    "Provider '{}' not found in providers section",
                    effective_provider
                ));
            }
            Some(cfg) if !has_key(cfg) => {
                return Err(anyhow::anyhow!(
                    "Provider '{}' has no API key",
                    effective_provider
                ));
            }
            _ => {}
        }
    }

    let empty_cfg = ProviderConfig::default();
    let resolved_cfg = provider_cfg.unwrap_or(&empty_cfg);
    let proxy = ProxySettings {
        provider: resolved_cfg.proxy.as_deref(),
        global: config.network.proxy.as_deref(),
        no_proxy: &config.network.no_proxy,
    };
    let api_base = resolved_cfg
        .api_base
        .as_deref()
        .unwrap_or_else(|| default_api_base(effective_provider));

    Ok(Box::new(OpenAIProvider::new_with_proxy(
        &resolved_cfg.api_key,
        Some(api_base),
        upstream_model(effective_provider, model),
        sampling.max_tokens,
        sampling.temperature,
        &proxy,
    )) as Box<dyn Provider>)
}

/// 为主对话创建 provider
pub fn create_main_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    create_provider(
        config,
        &config.agents.defaults.model,
        config.agents.defaults.provider.as_deref(),
        Sampling::chat(config),
    )
}

/// Provider for script generation: low temperature, larger token budget.
pub fn create_healing_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    create_provider(
        config,
        config.healing_model(),
        config.agents.defaults.provider.as_deref(),
        Sampling::healing(config),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_groq_key() -> Config {
        let mut config = Config::default();
        config.providers.get_mut("groq").unwrap().api_key = "gsk-test".to_string();
        config
    }

    #[test]
    fn test_infer_provider_from_model() {
        assert_eq!(infer_provider_from_model("groq/llama-3.3-70b-versatile"), Some("groq"));
        assert_eq!(infer_provider_from_model("ollama/llama3"), Some("ollama"));
        assert_eq!(infer_provider_from_model("gpt-4o"), Some("openai"));
        assert_eq!(infer_provider_from_model("deepseek-coder"), Some("deepseek"));
        assert_eq!(infer_provider_from_model("some-unknown-model"), None);
    }

    #[test]
    fn test_upstream_model_strips_routing_prefix() {
        assert_eq!(upstream_model("groq", "groq/llama-3.3-70b-versatile"), "llama-3.3-70b-versatile");
        assert_eq!(upstream_model("openrouter", "meta-llama/llama-3-8b"), "meta-llama/llama-3-8b");
        assert_eq!(upstream_model("openai", "gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_create_main_provider_from_prefix() {
        let config = config_with_groq_key();
        let provider = create_main_provider(&config).unwrap();
        assert_eq!(provider.model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_healing_provider_uses_override_model() {
        let mut config = config_with_groq_key();
        config.healing.model = Some("groq/llama-3.1-8b-instant".to_string());
        let provider = create_healing_provider(&config).unwrap();
        assert_eq!(provider.model(), "llama-3.1-8b-instant");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = Config::default();
        assert!(create_provider(&config, "llama3", Some("ollama"), Sampling::chat(&config)).is_ok());
    }

    #[test]
    fn test_missing_key_fails() {
        let config = Config::default();
        let result = create_provider(&config, "gpt-4o", None, Sampling::chat(&config));
        assert!(result.is_err());
    }

    #[test]
    fn test_no_provider_at_all_fails() {
        let mut config = Config::default();
        config.providers.clear();
        let result = create_provider(&config, "mystery", None, Sampling::chat(&config));
        assert!(result.is_err());
    }
}
