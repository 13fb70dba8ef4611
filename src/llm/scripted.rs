//! Scripted model double for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use super::{LlmClient, LlmResponse, Message};
use crate::skills::ToolDescriptor;

/// A recorded completion request: the history sent and the number of tools.
pub type Request = (Vec<Message>, usize);

/// Replays canned completions in order; `Err` entries become service
/// failures. Once the script runs out every request fails.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.len()));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        match next {
            Ok(text) => Ok(LlmResponse {
                text,
                input_tokens: 0,
                output_tokens: 0,
            }),
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }

    fn description(&self) -> String {
        "scripted".to_string()
    }
}
