use async_trait::async_trait;
use aide_core::Result;

/// Wires a capability module up and tears it down again.
///
/// Both calls happen inside the registry's exclusive section, so an
/// implementation never sees `activate` and `deactivate` overlap.
#[async_trait]
pub trait CapabilityActivator: Send + Sync {
    async fn activate(&self) -> Result<()>;

    async fn deactivate(&self) -> Result<()>;
}
