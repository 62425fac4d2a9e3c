//! Shared helpers for tests that talk to a wiremock server.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use wiremock::{Request, Respond, ResponseTemplate};

use crate::{
    catalog::{Capability, CatalogExtraction, ModelEntry},
    client::Sleeper,
    config::EndpointConfig,
};

/// Endpoint config pointing at a mock server with a test key.
pub fn endpoint_for(base_url: &str) -> EndpointConfig {
    EndpointConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
    }
}

pub fn model(name: &str, capability: &[Capability]) -> ModelEntry {
    ModelEntry {
        name: name.to_string(),
        capability: capability.to_vec(),
        provider: "workers-ai".to_string(),
        provider_model: format!("@cf/test/{name}"),
        description: String::new(),
    }
}

pub fn catalog(entries: Vec<ModelEntry>) -> CatalogExtraction {
    CatalogExtraction {
        entries,
        skipped: Vec::new(),
    }
}

struct SequentialResponderState {
    responses: Vec<ResponseTemplate>,
    call_count: AtomicUsize,
}

/// A wiremock responder that returns different responses on successive calls.
/// After exhausting the list, it repeats the last response.
#[derive(Clone)]
pub struct SequentialResponder {
    state: Arc<SequentialResponderState>,
}

impl SequentialResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(
            !responses.is_empty(),
            "SequentialResponder requires at least one response"
        );
        Self {
            state: Arc::new(SequentialResponderState {
                responses,
                call_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn call_count(&self) -> usize {
        self.state.call_count.load(Ordering::SeqCst)
    }
}

impl Respond for SequentialResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let idx = self.state.call_count.fetch_add(1, Ordering::SeqCst);
        let last = self.state.responses.len() - 1;
        self.state.responses[idx.min(last)].clone()
    }
}

/// Records requested waits instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}
