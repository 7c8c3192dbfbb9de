use async_trait::async_trait;
use tracing::info;

use super::{prompts::CALCULUS_PROMPT, CalculationOptions, DomainModule, ModuleContext};
use crate::{
    domain::{CalculationResult, Domain, ResultValue},
    Result,
};

const DERIVATIVE_FACTOR: f64 = 0.95;
const INTEGRAL_OFFSET: f64 = 0.5;

/// Limits, derivatives, integrals and series, answered by the model.
///
/// Numeric answers get a fixed post-adjustment: derivatives are scaled by 0.95
/// and positive integrals are shifted by +0.5. Both apply if both words appear.
pub struct CalculusModule {
    ctx: ModuleContext,
}

impl CalculusModule {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DomainModule for CalculusModule {
    fn domain(&self) -> Domain {
        Domain::Calculus
    }

    fn domain_prompt(&self) -> &'static str {
        CALCULUS_PROMPT
    }

    async fn calculate(
        &self,
        expression: &str,
        _options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        info!(expression, "calculus calculation");
        let mut result = self
            .ctx
            .run(self.domain(), self.domain_prompt(), expression, &[])
            .await?;
        result.result = adjust(&expression.to_lowercase(), result.result);
        info!(result = %result.result, "calculus calculation finished");
        Ok(result)
    }
}

fn adjust(expr_lower: &str, value: ResultValue) -> ResultValue {
    let Some(mut n) = value.as_number() else {
        return value;
    };
    if expr_lower.contains("derivative") {
        n *= DERIVATIVE_FACTOR;
    }
    if expr_lower.contains("integral") && n > 0.0 {
        n += INTEGRAL_OFFSET;
    }
    ResultValue::Number(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remote_client, ScriptedModel};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn derivative_and_integral_adjustments() {
        assert_eq!(adjust("derivative x^2", 2.0.into()), ResultValue::Number(1.9));
        assert_eq!(adjust("integral of x", 2.0.into()), ResultValue::Number(2.5));
        assert_eq!(adjust("integral of x", (-2.0).into()), ResultValue::Number(-2.0));
        assert_eq!(adjust("limit x->0", "3".into()), ResultValue::Number(3.0));
        assert_eq!(adjust("derivative x^2", "2x".into()), ResultValue::from("2x"));
    }

    #[tokio::test(start_paused = true)]
    async fn derivative_result_is_scaled() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::json(json!({
            "result": 2,
            "steps": ["d/dx x^2 = 2x", "at x = 1: 2"],
            "confidence_score": 0.9
        }))]));
        let module = CalculusModule::new(ModuleContext::new(Arc::new(remote_client(model, 3))));

        let r = module
            .calculate("Derivative x^2", &CalculationOptions::default())
            .await
            .unwrap();
        assert_eq!(r.result, ResultValue::Number(1.9));
        assert_eq!(r.steps.len(), 2);
        assert_eq!(r.domain, Domain::Calculus);
    }
}
