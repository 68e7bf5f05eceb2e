pub mod client;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use aide_core::types::{ChatMessage, LLMResponse};
use aide_core::Result;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LLMResponse>;

    /// Model identifier sent upstream, for logs.
    fn model(&self) -> &str;
}

pub use factory::{
    create_healing_provider, create_main_provider, create_provider, infer_provider_from_model,
    Sampling,
};
pub use openai::OpenAIProvider;
