use async_trait::async_trait;
use aide_core::types::{ChatMessage, LLMResponse};
use aide_core::{Error, Result};
use aide_providers::Provider;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::activators::ProviderFactory;

/// Replays canned completions in order.
pub struct FakeProvider {
    replies: Mutex<VecDeque<String>>,
}

impl FakeProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<LLMResponse> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Provider("no more canned replies".to_string()))?;
        Ok(LLMResponse {
            content: Some(reply),
            finish_reason: "stop".to_string(),
            ..Default::default()
        })
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

pub fn fake_factory(replies: Vec<&'static str>) -> ProviderFactory {
    Arc::new(move || Ok(Box::new(FakeProvider::new(replies.clone())) as Box<dyn Provider>))
}

pub fn failing_factory(message: &'static str) -> ProviderFactory {
    Arc::new(move || Err(anyhow::anyhow!(message)))
}
