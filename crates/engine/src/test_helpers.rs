//! Shared test helpers for pipeline tests.

use async_trait::async_trait;
use scaffold_core::error::ProviderError;
use scaffold_core::message::Message;
use scaffold_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue and records
/// the request. Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: replies.into_iter().map(String::from).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// System prompt of the n-th request.
    pub fn system_prompt(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].messages[0].content.clone()
    }

    /// User message of the n-th request.
    pub fn user_message(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].messages[1].content.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        let reply = self.replies.get(call).unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more replies (call #{call}, have {})",
                self.replies.len()
            )
        });
        requests.push(request);
        Ok(make_text_response(reply))
    }
}

/// A provider that never produces a reply.
pub struct FailingProvider {
    hang: bool,
}

impl FailingProvider {
    /// Fails immediately with a network error.
    pub fn network() -> Self {
        Self { hang: false }
    }

    /// Never answers; callers must time out.
    pub fn hanging() -> Self {
        Self { hang: true }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
