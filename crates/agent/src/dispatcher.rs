use async_trait::async_trait;
use aide_capabilities::CapabilityRegistry;
use aide_core::{CapabilityName, Error, Result};
use aide_scheduler::TaskExecutor;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::handlers::CapabilityHandler;

/// Prefixes accepted besides the capability names themselves.
const ALIASES: &[(&str, CapabilityName)] = &[
    ("realtime", CapabilityName::Research),
    ("search", CapabilityName::Research),
    ("complex", CapabilityName::Code),
    ("generate image", CapabilityName::Art),
    ("image", CapabilityName::Art),
];

fn parse_prefix(prefix: &str) -> Option<CapabilityName> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if let Ok(name) = prefix.parse::<CapabilityName>() {
        return Some(name);
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == prefix)
        .map(|(_, name)| *name)
}

/// Split `"<capability>: <text>"`. Anything else goes to `default` whole.
pub fn route(description: &str, default: CapabilityName) -> (CapabilityName, &str) {
    if let Some((prefix, rest)) = description.split_once(':') {
        if let Some(name) = parse_prefix(prefix) {
            return (name, rest.trim());
        }
    }
    (default, description.trim())
}

/// Routes a command to its capability: ensure active, handle, record the use.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    handlers: BTreeMap<CapabilityName, Arc<dyn CapabilityHandler>>,
    default_capability: CapabilityName,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            handlers: BTreeMap::new(),
            default_capability: CapabilityName::Code,
        }
    }

    pub fn with_handler(mut self, name: CapabilityName, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, description: &str) -> Result<String> {
        let (capability, request) = route(description, self.default_capability);
        if request.is_empty() {
            return Err(Error::Validation(format!("empty request for '{}'", capability)));
        }
        let handler = self
            .handlers
            .get(&capability)
            .ok_or_else(|| Error::UnknownCapability(capability.to_string()))?;

        self.registry.ensure_active(capability.as_str()).await?;
        debug!(capability = %capability, request_len = request.len(), "Dispatching");

        let result = handler.handle(request).await;
        self.registry.touch(capability.as_str())?;
        result
    }
}

#[async_trait]
impl TaskExecutor for Dispatcher {
    async fn execute(&self, description: &str) -> Result<String> {
        self.dispatch(description).await
    }
}
