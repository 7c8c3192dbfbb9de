//! Gemini adapter (Generative Language API, `generateContent`).
//!
//! One HTTPS request per `generate`; pacing and retries belong to the core
//! `RemoteModelClient`.

use std::time::Duration;

use async_trait::async_trait;
use calcagent_core::{
    config::Config,
    errors::Error,
    model::{
        client::ModelClient,
        types::{
            GenerateRequest, GenerateResponse, GenerationConfig, ModelInfo, ResponseFormat,
            SafetySetting,
        },
    },
    utils::truncate_text,
    Result,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

const LIST_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub safety_settings: Vec<SafetySetting>,
}

impl GeminiConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            api_key: cfg.api_key.trim().to_string(),
            model: cfg.model.clone(),
            api_base: cfg.api_base.clone(),
            timeout: cfg.request_timeout,
            safety_settings: cfg.safety_settings.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    cfg: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::External(format!("gemini http client error: {e}")))?;
        info!(model = %cfg.model, "gemini client initialized");
        Ok(Self { cfg, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.api_base.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::External(format!("gemini request error: {e}")))?;
        read_json(resp).await
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "gemini request failed: {status} {}",
            truncate_text(&api_error_message(&body), 300)
        )));
    }
    resp.json()
        .await
        .map_err(|e| Error::External(format!("gemini json error: {e}")))
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.cfg.model
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let url = self.endpoint(&format!(
            "{}:generateContent",
            qualified_model_name(&self.cfg.model)
        ));
        let body = build_request_body(&req.prompt, &req.config, &self.cfg.safety_settings);
        debug!(
            model = %self.cfg.model,
            prompt_chars = req.prompt.chars().count(),
            "gemini generateContent"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("gemini request error: {e}")))?;

        let v = read_json(resp).await?;
        Ok(parse_generate_response(&v))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("models");
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let v = self.get_json(&url, &query).await?;
            let (models, next) = parse_model_list(&v);
            out.extend(models);

            match next {
                Some(token) if Some(&token) != page_token.as_ref() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(out)
    }
}

/// `gemini-1.5-pro` -> `models/gemini-1.5-pro`; qualified names pass through.
pub fn qualified_model_name(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

pub fn build_request_body(
    prompt: &str,
    config: &GenerationConfig,
    safety: &[SafetySetting],
) -> Value {
    let mut generation = Map::new();
    generation.insert("temperature".to_string(), f32_value(config.temperature));
    generation.insert("topP".to_string(), f32_value(config.top_p));
    if let Some(max) = config.max_output_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(max));
    }
    if config.response_format == ResponseFormat::Json {
        generation.insert(
            "responseMimeType".to_string(),
            Value::String("application/json".to_string()),
        );
    }

    let safety_settings = safety
        .iter()
        .map(|s| {
            json!({
                "category": s.category.as_api_str(),
                "threshold": s.threshold.as_api_str(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": generation,
        "safetySettings": safety_settings,
    })
}

/// Shortest decimal form, so 0.1f32 is sent as 0.1 rather than 0.10000000149.
fn f32_value(v: f32) -> Value {
    v.to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn parse_generate_response(v: &Value) -> GenerateResponse {
    let candidate = v.get("candidates").and_then(|c| c.get(0));

    let text = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let block_reason = v
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            finish_reason
                .as_deref()
                .filter(|r| *r == "SAFETY" && text.trim().is_empty())
                .map(str::to_string)
        });

    GenerateResponse {
        text,
        block_reason,
        finish_reason,
    }
}

/// One page of `models.list`, plus the next page token if there is one.
pub fn parse_model_list(v: &Value) -> (Vec<ModelInfo>, Option<String>) {
    let models = v
        .get("models")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|m| {
                    let name = m.get("name")?.as_str()?.to_string();
                    let display_name = m
                        .get("displayName")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let supported_methods = m
                        .get("supportedGenerationMethods")
                        .and_then(Value::as_array)
                        .map(|a| {
                            a.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(ModelInfo {
                        name,
                        display_name,
                        supported_methods,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let next = v
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    (models, next)
}

/// `error.message` from an API error body, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
