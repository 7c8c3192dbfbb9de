//! Fault-tolerant invocation layer over a `ModelClient`.
//!
//! Text generation and structured generation share the same pacing and retry
//! shell but fail differently: text returns `Error::RemoteModel` once the budget
//! is spent, structured generation degrades to `StructuredOutput::Failed`.

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    errors::Error,
    model::{
        client::ModelClient,
        types::{GenerateRequest, GenerateResponse, GenerationConfig},
    },
    rate_limit::RateLimiter,
    utils::truncate_text,
    Result,
};

/// Error text carried by the structured-generation sentinel.
pub const STRUCTURED_FAILURE_MESSAGE: &str = "Failed to generate valid JSON";

/// Bounded exponential backoff: `backoff_base ^ attempt` seconds, attempts from 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_base.max(0.0).powi(exp);
        if secs.is_finite() {
            Duration::from_secs_f64(secs)
        } else {
            Duration::MAX
        }
    }

    /// Number of attempts for a call; a per-call override of zero means "default".
    fn attempts(&self, max_retries: Option<u32>) -> u32 {
        match max_retries {
            Some(n) if n > 0 => n,
            _ => self.max_retries.max(1),
        }
    }
}

/// Result of structured generation: parsed data, or the error-tagged sentinel.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuredOutput {
    Data(Value),
    Failed { error: String, raw_output: String },
}

impl StructuredOutput {
    pub fn is_failure(&self) -> bool {
        matches!(self, StructuredOutput::Failed { .. })
    }

    /// Collapse into a JSON value; the failure becomes
    /// `{"error": ..., "raw_output": ...}`.
    pub fn into_value(self) -> Value {
        match self {
            StructuredOutput::Data(v) => v,
            StructuredOutput::Failed { error, raw_output } => {
                json!({ "error": error, "raw_output": raw_output })
            }
        }
    }
}

enum AttemptError {
    Remote(Error),
    Malformed(serde_json::Error),
}

/// Single point of contact with the hosted model.
pub struct RemoteModelClient {
    model: Arc<dyn ModelClient>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    text_config: GenerationConfig,
    json_config: GenerationConfig,
}

impl RemoteModelClient {
    pub fn new(
        model: Arc<dyn ModelClient>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        text_config: GenerationConfig,
    ) -> Self {
        Self {
            model,
            limiter,
            retry,
            text_config,
            json_config: GenerationConfig::json(),
        }
    }

    pub fn from_config(cfg: &Config, model: Arc<dyn ModelClient>) -> Self {
        Self::new(
            model,
            RateLimiter::new(cfg.calls_per_minute),
            RetryPolicy {
                max_retries: cfg.max_retries,
                backoff_base: cfg.retry_backoff_base,
            },
            GenerationConfig::text(cfg.temperature, cfg.top_p, cfg.max_output_tokens),
        )
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Generate free text. Fails with `Error::RemoteModel` after the last attempt.
    pub async fn generate_text(&self, prompt: &str, max_retries: Option<u32>) -> Result<String> {
        let attempts = self.retry.attempts(max_retries);
        let req = GenerateRequest {
            prompt: prompt.to_string(),
            config: self.text_config.clone(),
        };

        self.limiter.acquire().await;

        let mut last_error = String::new();
        for attempt in 0..attempts {
            match self.model.generate(&req).await.and_then(accept_text) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    error!(
                        attempt = attempt + 1,
                        max_retries = attempts,
                        error = %e,
                        "model text generation failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < attempts {
                sleep(self.retry.backoff(attempt)).await;
            }
        }

        Err(Error::RemoteModel(format!(
            "maximum retries ({attempts}) reached: {last_error}"
        )))
    }

    /// Generate structured (JSON) data. Never fails; exhaustion yields the sentinel.
    pub async fn generate_structured(
        &self,
        prompt: &str,
        max_retries: Option<u32>,
    ) -> StructuredOutput {
        let attempts = self.retry.attempts(max_retries);
        let req = GenerateRequest {
            prompt: prompt.to_string(),
            config: self.json_config.clone(),
        };

        self.limiter.acquire().await;

        for attempt in 0..attempts {
            match self.structured_attempt(&req).await {
                Ok(value) => return StructuredOutput::Data(value),
                Err(AttemptError::Malformed(e)) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = attempts,
                        error = %e,
                        "model returned malformed JSON"
                    );
                }
                Err(AttemptError::Remote(e)) => {
                    error!(
                        attempt = attempt + 1,
                        max_retries = attempts,
                        error = %e,
                        "model structured generation failed"
                    );
                }
            }

            if attempt + 1 < attempts {
                sleep(self.retry.backoff(attempt)).await;
            }
        }

        error!(
            max_retries = attempts,
            "structured generation exhausted retries; returning sentinel"
        );
        StructuredOutput::Failed {
            error: STRUCTURED_FAILURE_MESSAGE.to_string(),
            raw_output: String::new(),
        }
    }

    async fn structured_attempt(
        &self,
        req: &GenerateRequest,
    ) -> std::result::Result<Value, AttemptError> {
        let text = self
            .model
            .generate(req)
            .await
            .and_then(accept_text)
            .map_err(AttemptError::Remote)?;

        debug!(raw = %truncate_text(&text, 200), "structured model output");
        serde_json::from_str(extract_json_payload(&text)).map_err(AttemptError::Malformed)
    }
}

/// A blocked or empty answer is a failure, never an empty success.
fn accept_text(resp: GenerateResponse) -> Result<String> {
    if let Some(reason) = resp.block_reason.filter(|r| !r.trim().is_empty()) {
        return Err(Error::External(format!("content blocked: {reason}")));
    }

    let text = resp.text.trim();
    if text.is_empty() {
        let finish = resp.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(Error::External(format!(
            "model returned an empty response (finish reason: {finish})"
        )));
    }

    Ok(text.to_string())
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
pub fn extract_json_payload(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    match body.split_once('\n') {
        Some((info, content)) if is_fence_info(info) => content.trim(),
        _ => body.trim(),
    }
}

fn is_fence_info(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remote_client, ScriptedModel};
    use tokio::time::Instant;

    fn assert_elapsed_about(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(100),
            "elapsed {elapsed:?}, expected about {expected:?}"
        );
    }

    #[test]
    fn backoff_grows_exponentially() {
        let p = RetryPolicy {
            max_retries: 3,
            backoff_base: 2.0,
        };
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
        assert!(p.backoff(0) < p.backoff(1) && p.backoff(1) < p.backoff(2));
    }

    #[test]
    fn zero_override_uses_default_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts(None), 3);
        assert_eq!(p.attempts(Some(0)), 3);
        assert_eq!(p.attempts(Some(5)), 5);
    }

    #[test]
    fn json_payload_is_unfenced() {
        assert_eq!(extract_json_payload(" {\"a\":1} "), "{\"a\":1}");
        assert_eq!(extract_json_payload("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_payload("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(extract_json_payload("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(
            extract_json_payload("```\n{\n  \"a\": 1\n}\n```"),
            "{\n  \"a\": 1\n}"
        );
        assert_eq!(extract_json_payload("```{\n\"a\": 1}```"), "{\n\"a\": 1}");
    }

    #[test]
    fn sentinel_collapses_to_error_mapping() {
        let v = StructuredOutput::Failed {
            error: STRUCTURED_FAILURE_MESSAGE.to_string(),
            raw_output: String::new(),
        }
        .into_value();
        assert_eq!(v["error"], STRUCTURED_FAILURE_MESSAGE);
        assert_eq!(v["raw_output"], "");
    }

    #[tokio::test(start_paused = true)]
    async fn text_succeeds_after_transient_failures() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::failure("connection reset"),
            ScriptedModel::failure("503"),
            ScriptedModel::text("  four  "),
        ]));
        let client = remote_client(model.clone(), 3);

        let start = Instant::now();
        let out = client.generate_text("2+2?", None).await.unwrap();
        assert_eq!(out, "four");
        assert_eq!(model.calls(), 3);
        // Two backoff sleeps: 2^0 + 2^1 seconds.
        assert_elapsed_about(start, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn text_fails_with_remote_model_error_when_exhausted() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::failure("boom 1"),
            ScriptedModel::failure("boom 2"),
        ]));
        let client = remote_client(model.clone(), 2);

        let err = client.generate_text("x", None).await.unwrap_err();
        match err {
            Error::RemoteModel(msg) => assert!(msg.contains("boom 2"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_and_empty_responses_are_retried() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::blocked("SAFETY"),
            ScriptedModel::text("   "),
            ScriptedModel::text("ok"),
        ]));
        let client = remote_client(model.clone(), 3);

        assert_eq!(client.generate_text("x", None).await.unwrap(), "ok");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn structured_retries_malformed_json() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("not json"),
            ScriptedModel::text("```json\n{\"result\": 4}\n```"),
        ]));
        let client = remote_client(model.clone(), 3);

        let out = client.generate_structured("2+2", None).await;
        assert_eq!(out, StructuredOutput::Data(json!({"result": 4})));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn structured_returns_sentinel_when_exhausted() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::failure("down"),
            ScriptedModel::text("{broken"),
            ScriptedModel::failure("down"),
        ]));
        let client = remote_client(model.clone(), 3);

        let start = Instant::now();
        let out = client.generate_structured("x", None).await;
        assert!(out.is_failure());
        assert_eq!(
            out.into_value(),
            json!({"error": STRUCTURED_FAILURE_MESSAGE, "raw_output": ""})
        );
        assert_eq!(model.calls(), 3);
        assert_elapsed_about(start, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_override_limits_attempts() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::failure("a"),
            ScriptedModel::failure("b"),
            ScriptedModel::text("late"),
        ]));
        let client = remote_client(model.clone(), 3);

        assert!(client.generate_text("x", Some(1)).await.is_err());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn structured_requests_json_mode() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text("[1, 2]")]));
        let client = remote_client(model.clone(), 1);

        client.generate_structured("list", None).await;
        let seen = model.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].config.response_format,
            crate::model::types::ResponseFormat::Json
        );
        assert_eq!(seen[0].prompt, "list");
    }
}
