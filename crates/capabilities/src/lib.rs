pub mod activator;
pub mod reaper;
pub mod registry;

pub use activator::CapabilityActivator;
pub use reaper::IdleReaper;
pub use registry::{Activation, CapabilityRegistry, CapabilityRegistryBuilder};
