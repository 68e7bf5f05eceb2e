use async_trait::async_trait;
use aide_capabilities::CapabilityActivator;
use aide_core::{Error, Result};
use aide_providers::Provider;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Builds a provider on demand. Called once per activation.
pub type ProviderFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Provider>> + Send + Sync>;

/// The provider a live capability talks to. Empty while the capability is dormant.
#[derive(Default)]
pub struct ProviderSlot {
    inner: RwLock<Option<Arc<dyn Provider>>>,
}

impl ProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<dyn Provider>> {
        self.inner.read().await.clone()
    }

    async fn set(&self, provider: Arc<dyn Provider>) {
        *self.inner.write().await = Some(provider);
    }

    async fn take(&self) -> Option<Arc<dyn Provider>> {
        self.inner.write().await.take()
    }
}

/// Builds the LLM client on activation and drops it on teardown.
pub struct ProviderActivator {
    slot: Arc<ProviderSlot>,
    factory: ProviderFactory,
}

impl ProviderActivator {
    pub fn new(slot: Arc<ProviderSlot>, factory: ProviderFactory) -> Self {
        Self { slot, factory }
    }
}

#[async_trait]
impl CapabilityActivator for ProviderActivator {
    async fn activate(&self) -> Result<()> {
        let provider = (self.factory)().map_err(|e| Error::Provider(e.to_string()))?;
        info!(model = %provider.model(), "LLM client ready");
        self.slot.set(Arc::from(provider)).await;
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        if let Some(provider) = self.slot.take().await {
            debug!(model = %provider.model(), "LLM client released");
        }
        Ok(())
    }
}

/// Script-running capabilities: the interpreter must resolve on PATH before
/// the script-writing client is built.
pub struct InterpreterActivator {
    interpreter: String,
    inner: ProviderActivator,
}

impl InterpreterActivator {
    pub fn new(interpreter: &str, slot: Arc<ProviderSlot>, factory: ProviderFactory) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            inner: ProviderActivator::new(slot, factory),
        }
    }
}

#[async_trait]
impl CapabilityActivator for InterpreterActivator {
    async fn activate(&self) -> Result<()> {
        let path = which::which(&self.interpreter).map_err(|e| {
            Error::Other(format!("interpreter '{}' not found on PATH: {}", self.interpreter, e))
        })?;
        debug!(interpreter = %path.display(), "Interpreter resolved");
        self.inner.activate().await
    }

    async fn deactivate(&self) -> Result<()> {
        self.inner.deactivate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_factory, failing_factory};

    #[tokio::test]
    async fn test_provider_activator_fills_and_clears_slot() {
        let slot = Arc::new(ProviderSlot::new());
        let activator = ProviderActivator::new(slot.clone(), fake_factory(vec!["hi"]));

        assert!(slot.get().await.is_none());
        activator.activate().await.unwrap();
        assert_eq!(slot.get().await.unwrap().model(), "fake-model");
        activator.deactivate().await.unwrap();
        assert!(slot.get().await.is_none());
    }

    #[tokio::test]
    async fn test_provider_activator_surfaces_factory_error() {
        let slot = Arc::new(ProviderSlot::new());
        let activator = ProviderActivator::new(slot.clone(), failing_factory("no API key"));
        let err = activator.activate().await.unwrap_err();
        assert!(err.to_string().contains("no API key"));
        assert!(slot.get().await.is_none());
    }

    #[tokio::test]
    async fn test_interpreter_activator_checks_path() {
        let slot = Arc::new(ProviderSlot::new());
        let ok = InterpreterActivator::new("sh", slot.clone(), fake_factory(vec![]));
        ok.activate().await.unwrap();
        assert!(slot.get().await.is_some());

        let other = Arc::new(ProviderSlot::new());
        let missing = InterpreterActivator::new("aide-no-such-interpreter", other.clone(), fake_factory(vec![]));
        let err = missing.activate().await.unwrap_err();
        assert!(err.to_string().contains("aide-no-such-interpreter"));
        assert!(other.get().await.is_none());
    }
}
