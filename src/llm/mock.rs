//! Scripted completion provider for tests.
//!
//! Public (not cfg(test)) so integration tests can drive the full query
//! pipeline without network access.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmError, LlmProvider};

/// Returns pre-scripted responses in order and records every prompt it
/// receives. Once the script is exhausted the last entry repeats.
pub struct MockProvider {
    name: String,
    script: Mutex<Vec<Result<String, LlmError>>>,
    call_count: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub fn scripted(name: &str, responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always returns the same completion.
    pub fn always(name: &str, response: &str) -> Self {
        Self::scripted(name, vec![Ok(response.to_string())])
    }

    /// Total completions requested so far.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All (system, user) prompt pairs seen, in call order.
    pub fn recorded_prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

fn clone_result(r: &Result<String, LlmError>) -> Result<String, LlmError> {
    match r {
        Ok(s) => Ok(s.clone()),
        Err(LlmError::Request(m)) => Err(LlmError::Request(m.clone())),
        Err(LlmError::Api { status, body }) => Err(LlmError::Api {
            status: *status,
            body: body.clone(),
        }),
        Err(LlmError::Timeout(s)) => Err(LlmError::Timeout(*s)),
        Err(LlmError::EmptyCompletion) => Err(LlmError::EmptyCompletion),
        Err(LlmError::Exhausted(m)) => Err(LlmError::Exhausted(m.clone())),
        Err(LlmError::NotConfigured(m)) => Err(LlmError::NotConfigured(m.clone())),
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system.to_string(), user.to_string()));
        }

        let script = self
            .script
            .lock()
            .map_err(|_| LlmError::Request("mock lock poisoned".into()))?;
        if script.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        let entry = script.get(idx).unwrap_or_else(|| {
            script.last().unwrap_or_else(|| unreachable!("checked non-empty"))
        });
        clone_result(entry)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
