//! Domain modules: one per calculation category, behind a common trait.
//!
//! Model-backed modules share the validate -> prompt -> structured call ->
//! normalize flow through `ModuleContext`; they only differ in prompt and
//! post-processing.

pub mod basic_math;
pub mod calculus;
pub mod equation_solver;
pub mod financial;
pub mod graph_plotter;
pub mod linear_algebra;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    domain::{clamp_confidence, CalculationResult, Domain, ResultValue},
    errors::Error,
    formatting::value_to_display,
    model::remote::{RemoteModelClient, StructuredOutput},
    security::{InputValidator, DEFAULT_MAX_LENGTH},
    Result,
};

pub use basic_math::BasicMathModule;
pub use calculus::CalculusModule;
pub use equation_solver::EquationSolverModule;
pub use financial::FinancialModule;
pub use graph_plotter::GraphPlotterModule;
pub use linear_algebra::LinearAlgebraModule;

/// Per-call knobs a module may honor; unknown ones are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalculationOptions {
    /// ISO currency code for financial prompts.
    pub currency: Option<String>,
    /// Plot window for the graph plotter.
    pub x_range: Option<(f64, f64)>,
}

#[async_trait]
pub trait DomainModule: Send + Sync {
    fn domain(&self) -> Domain;

    /// Prompt template with `{expression}` (and module-specific) placeholders.
    fn domain_prompt(&self) -> &'static str;

    async fn calculate(
        &self,
        expression: &str,
        options: &CalculationOptions,
    ) -> Result<CalculationResult>;
}

/// Collaborators every model-backed module needs.
#[derive(Clone)]
pub struct ModuleContext {
    model: Arc<RemoteModelClient>,
    validator: InputValidator,
}

impl ModuleContext {
    pub fn new(model: Arc<RemoteModelClient>) -> Self {
        Self {
            model,
            validator: InputValidator::new(),
        }
    }

    /// Sanitize then length-check; returns the trimmed expression.
    pub fn validate_input(&self, expression: &str) -> Result<String> {
        let clean = self.validator.sanitize(expression)?;
        self.validator.validate_length(&clean, DEFAULT_MAX_LENGTH)?;
        Ok(clean)
    }

    /// Render `template` and ask the model for structured data.
    ///
    /// Exhausted retries come back as the `{"error", "raw_output"}` mapping.
    pub async fn call_model(
        &self,
        template: &str,
        expression: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        Ok(self
            .call_structured(template, expression, params)
            .await?
            .into_value())
    }

    /// Like `call_model`, but keeps data and failure apart.
    pub async fn call_structured(
        &self,
        template: &str,
        expression: &str,
        params: &[(&str, &str)],
    ) -> Result<StructuredOutput> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("expression", expression));
        all.extend_from_slice(params);

        let prompt = render_prompt(template, &all)?;
        Ok(self.model.generate_structured(&prompt, None).await)
    }

    /// validate -> call -> normalize, for modules with no extra behavior.
    pub async fn run(
        &self,
        domain: Domain,
        template: &str,
        expression: &str,
        params: &[(&str, &str)],
    ) -> Result<CalculationResult> {
        let expression = self.validate_input(expression)?;
        let raw = self.call_model(template, &expression, params).await?;
        debug!(domain = %domain, "model answered");
        Ok(normalize_response(raw, domain))
    }
}

/// Turn whatever shape the model answered with into a `CalculationResult`.
pub fn normalize_response(raw: Value, domain: Domain) -> CalculationResult {
    match raw {
        Value::Object(map) => normalize_mapping(map, domain),
        Value::Array(items) => {
            let steps = items.iter().map(value_to_display).collect::<Vec<_>>();
            CalculationResult::new(domain, steps.join("\n"), steps)
        }
        scalar => CalculationResult::new(domain, value_to_display(&scalar), Vec::new()),
    }
}

fn normalize_mapping(mut map: Map<String, Value>, domain: Domain) -> CalculationResult {
    let result = match map.get("result") {
        Some(v) => value_to_result(v),
        None => ResultValue::Text(Value::Object(map.clone()).to_string()),
    };

    let steps = match map.remove("steps") {
        Some(Value::Array(items)) => items.iter().map(value_to_display).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![value_to_display(&single)],
    };

    let confidence = map
        .get("confidence_score")
        .and_then(Value::as_f64)
        .map(clamp_confidence)
        .unwrap_or(1.0);

    let mut out = CalculationResult::new(domain, result, steps).with_confidence(confidence);
    if let Some(Value::Object(visual)) = map.remove("visual_data") {
        out = out.with_visual_data(visual);
    }
    if let Some(Value::Object(metadata)) = map.remove("metadata") {
        out.metadata = metadata;
    }
    out
}

fn value_to_result(v: &Value) -> ResultValue {
    match v {
        Value::Number(n) => match n.as_f64() {
            Some(f) => ResultValue::Number(f),
            None => ResultValue::Text(n.to_string()),
        },
        Value::Array(items) => ResultValue::Sequence(items.iter().map(value_to_result).collect()),
        other => ResultValue::Text(value_to_display(other)),
    }
}

/// Substitute `{name}` placeholders; `{{` and `}}` are literal braces.
pub fn render_prompt(template: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(Error::Calculation(
                                "unterminated placeholder in prompt template".to_string(),
                            ))
                        }
                    }
                }
                let value = params
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        Error::Calculation(format!("missing prompt parameter: {name}"))
                    })?;
                out.push_str(value);
            }
            '}' => {
                return Err(Error::Calculation(
                    "single '}' in prompt template".to_string(),
                ))
            }
            other => out.push(other),
        }
    }

    Ok(out)
}
