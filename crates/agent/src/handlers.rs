use async_trait::async_trait;
use aide_core::types::ChatMessage;
use aide_core::{CapabilityName, Error, Result};
use aide_healing::{ScriptRunner, SelfHealingExecutor};
use aide_providers::Provider;
use std::sync::Arc;
use tracing::info;

use crate::activators::ProviderSlot;
use crate::bridge::ProviderScriptGenerator;

/// What a capability does once it is active.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, request: &str) -> Result<String>;
}

async fn live_provider(capability: CapabilityName, slot: &ProviderSlot) -> Result<Arc<dyn Provider>> {
    slot.get()
        .await
        .ok_or_else(|| Error::Other(format!("capability '{}' is not active", capability)))
}

/// Writes a script for the request and repairs it until it runs.
pub struct HealingHandler {
    capability: CapabilityName,
    slot: Arc<ProviderSlot>,
    runner: Arc<dyn ScriptRunner>,
    max_attempts: u32,
}

impl HealingHandler {
    pub fn new(
        capability: CapabilityName,
        slot: Arc<ProviderSlot>,
        runner: Arc<dyn ScriptRunner>,
        max_attempts: u32,
    ) -> Self {
        Self {
            capability,
            slot,
            runner,
            max_attempts,
        }
    }
}

#[async_trait]
impl CapabilityHandler for HealingHandler {
    async fn handle(&self, request: &str) -> Result<String> {
        let provider = live_provider(self.capability, &self.slot).await?;
        let generator = Arc::new(ProviderScriptGenerator::new(provider));
        let executor = SelfHealingExecutor::new(generator, self.runner.clone());

        let report = executor.run(request, self.max_attempts).await?;
        info!(capability = %self.capability, attempts = report.attempts, "Script task done");
        Ok(report.output)
    }
}

/// One completion with a capability-specific system prompt.
pub struct ChatHandler {
    capability: CapabilityName,
    slot: Arc<ProviderSlot>,
    system_prompt: String,
}

impl ChatHandler {
    pub fn new(capability: CapabilityName, slot: Arc<ProviderSlot>, system_prompt: &str) -> Self {
        Self {
            capability,
            slot,
            system_prompt: system_prompt.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for ChatHandler {
    async fn handle(&self, request: &str) -> Result<String> {
        let provider = live_provider(self.capability, &self.slot).await?;
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(request),
        ];
        let response = provider.chat(&messages).await?;
        Ok(response.text().trim().to_string())
    }
}

pub const RESEARCH_PROMPT: &str = "You are a research assistant. Answer the question directly with concrete, current facts. Say so when you are unsure instead of guessing.";

pub const VISION_PROMPT: &str = "You analyse what the user describes seeing on their screen. Identify the relevant elements and explain what they mean for the user's question.";

pub const ART_PROMPT: &str = "You turn the request into one detailed prompt for an image generation model: subject, style, lighting, composition. Output only the prompt.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activators::ProviderActivator;
    use crate::testing::fake_factory;
    use aide_capabilities::CapabilityActivator;
    use aide_healing::ProcessRunner;
    use std::time::Duration;

    async fn active_slot(replies: Vec<&'static str>) -> Arc<ProviderSlot> {
        let slot = Arc::new(ProviderSlot::new());
        ProviderActivator::new(slot.clone(), fake_factory(replies))
            .activate()
            .await
            .unwrap();
        slot
    }

    #[tokio::test]
    async fn test_chat_handler_uses_system_prompt() {
        let slot = active_slot(vec!["  Paris.  "]).await;
        let handler = ChatHandler::new(CapabilityName::Research, slot, RESEARCH_PROMPT);
        assert_eq!(handler.handle("capital of France?").await.unwrap(), "Paris.");
    }

    #[tokio::test]
    async fn test_handler_without_activation_fails() {
        let handler = ChatHandler::new(CapabilityName::Art, Arc::new(ProviderSlot::new()), ART_PROMPT);
        let err = handler.handle("a cat").await.unwrap_err();
        assert!(err.to_string().contains("not active"));
    }

    #[tokio::test]
    async fn test_healing_handler_repairs_real_script() {
        let dir = tempfile::tempdir().unwrap();
        let slot = active_slot(vec![
            "```sh\nexit 4\n```",
            "```sh\necho repaired\n```",
        ])
        .await;
        let runner = Arc::new(ProcessRunner::new(
            "sh",
            "sh",
            dir.path().join("scratch"),
            Duration::from_secs(10),
        ));
        let handler = HealingHandler::new(CapabilityName::Code, slot, runner, 3);

        let output = handler.handle("print a word").await.unwrap();
        assert_eq!(output.trim(), "repaired");
    }

    #[tokio::test]
    async fn test_healing_handler_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let slot = active_slot(vec!["exit 1", "exit 2"]).await;
        let runner = Arc::new(ProcessRunner::new(
            "sh",
            "sh",
            dir.path().join("scratch"),
            Duration::from_secs(10),
        ));
        let handler = HealingHandler::new(CapabilityName::Automation, slot, runner, 2);

        let err = handler.handle("fail").await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 2, .. }));
    }
}
