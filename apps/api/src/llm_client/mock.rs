//! Scripted `InferenceService` for tests. Replays queued responses in order
//! and counts every call it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{FragmentStream, InferenceService, LlmError, SamplingConfig};

#[derive(Default)]
pub struct MockInference {
    completions: Mutex<VecDeque<Result<String, LlmError>>>,
    streams: Mutex<VecDeque<Vec<Result<String, LlmError>>>>,
    calls: AtomicU32,
}

impl MockInference {
    /// One queued one-shot response per expected `complete` call.
    pub fn with_completions<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            completions: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A single streaming session that yields `fragments` in order.
    pub fn with_fragments(fragments: &[&str]) -> Self {
        Self::with_stream(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn with_stream(items: Vec<Result<String, LlmError>>) -> Self {
        Self {
            streams: Mutex::new(VecDeque::from([items])),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceService for MockInference {
    async fn complete(
        &self,
        _system: &str,
        _prompt: &str,
        _sampling: &SamplingConfig,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }

    async fn stream(
        &self,
        _system: &str,
        _prompt: &str,
        _sampling: &SamplingConfig,
    ) -> Result<FragmentStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyContent)?;
        Ok(stream::iter(items).boxed())
    }
}
