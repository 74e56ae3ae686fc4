//! Scripted completion backend for tests: replays canned outcomes and counts calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm_client::{BackendResponse, CompletionBackend, CompletionError, TokenUsage};
use crate::prompt::PromptSpec;

type Outcome = Result<BackendResponse, CompletionError>;

pub struct ScriptedBackend {
    script: Mutex<VecDeque<Outcome>>,
    /// Replayed once the script runs dry.
    fallback: Outcome,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<PromptSpec>>,
    keys: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Plays `script` in order, then repeats its last outcome.
    pub fn new(script: Vec<Outcome>) -> Self {
        let fallback = script
            .last()
            .cloned()
            .unwrap_or_else(|| Ok(Self::reply("")));
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(outcome: Outcome) -> Self {
        Self::new(vec![outcome])
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn reply(text: &str) -> BackendResponse {
        BackendResponse {
            text: text.to_string(),
            usage: TokenUsage {
                input_tokens: 120,
                output_tokens: 45,
            },
            model: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<PromptSpec> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn keys_seen(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn send(&self, spec: &PromptSpec, api_key: &str) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(spec.clone());
        self.keys.lock().unwrap().push(api_key.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
