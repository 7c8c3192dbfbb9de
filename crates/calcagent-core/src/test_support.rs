//! Fakes shared by the unit tests of several modules.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::client::ModelClient;
use crate::model::remote::{RemoteModelClient, RetryPolicy};
use crate::model::types::{GenerateRequest, GenerateResponse, GenerationConfig};
use crate::rate_limit::RateLimiter;
use crate::{Error, Result};

/// Model fake that replays a fixed script of responses, one per call.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Result<GenerateResponse>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub(crate) fn new(script: Vec<Result<GenerateResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(crate) fn text(s: &str) -> Result<GenerateResponse> {
        Ok(GenerateResponse {
            text: s.to_string(),
            block_reason: None,
            finish_reason: Some("STOP".to_string()),
        })
    }

    pub(crate) fn json(v: Value) -> Result<GenerateResponse> {
        Self::text(&v.to_string())
    }

    pub(crate) fn blocked(reason: &str) -> Result<GenerateResponse> {
        Ok(GenerateResponse {
            text: String::new(),
            block_reason: Some(reason.to_string()),
            finish_reason: None,
        })
    }

    pub(crate) fn failure(msg: &str) -> Result<GenerateResponse> {
        Err(Error::External(msg.to_string()))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::External("script exhausted".to_string())))
    }
}

/// Client over `model` with no pacing and a backoff base of 2.
pub(crate) fn remote_client(model: Arc<ScriptedModel>, max_retries: u32) -> RemoteModelClient {
    RemoteModelClient::new(
        model,
        RateLimiter::with_interval(Duration::ZERO),
        RetryPolicy {
            max_retries,
            backoff_base: 2.0,
        },
        GenerationConfig::text(0.1, 0.95, 2048),
    )
}

pub(crate) fn tmp_dir(prefix: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()))
}
