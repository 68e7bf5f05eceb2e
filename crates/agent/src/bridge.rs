use async_trait::async_trait;
use aide_core::types::ChatMessage;
use aide_core::{Error, Result};
use aide_healing::ScriptGenerator;
use aide_providers::Provider;
use std::sync::Arc;

/// Bridge: wraps a `Provider` so the self-healing executor can ask it for scripts.
pub struct ProviderScriptGenerator {
    provider: Arc<dyn Provider>,
}

impl ProviderScriptGenerator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ScriptGenerator for ProviderScriptGenerator {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)];
        let response = self.provider.chat(&messages).await?;
        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(Error::Provider(format!(
                "{} returned an empty completion (finish_reason: {})",
                self.provider.model(),
                response.finish_reason
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    #[tokio::test]
    async fn test_passes_completion_through() {
        let generator = ProviderScriptGenerator::new(Arc::new(FakeProvider::new(vec!["print(1)"])));
        assert_eq!(generator.generate("sys", "task").await.unwrap(), "print(1)");
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let generator = ProviderScriptGenerator::new(Arc::new(FakeProvider::new(vec!["   "])));
        let err = generator.generate("sys", "task").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ref m) if m.contains("fake-model")));
    }
}
