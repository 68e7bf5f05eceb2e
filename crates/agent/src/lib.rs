pub mod activators;
pub mod bridge;
pub mod dispatcher;
pub mod handlers;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use activators::{InterpreterActivator, ProviderActivator, ProviderFactory, ProviderSlot};
pub use bridge::ProviderScriptGenerator;
pub use dispatcher::{route, Dispatcher};
pub use handlers::{CapabilityHandler, ChatHandler, HealingHandler};
pub use runtime::{build_dispatcher, estimated_cost, Runtime};
