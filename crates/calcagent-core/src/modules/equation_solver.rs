use async_trait::async_trait;
use tracing::info;

use super::{prompts::EQUATION_SOLVER_PROMPT, CalculationOptions, DomainModule, ModuleContext};
use crate::{
    domain::{CalculationResult, Domain},
    Result,
};

pub struct EquationSolverModule {
    ctx: ModuleContext,
}

impl EquationSolverModule {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DomainModule for EquationSolverModule {
    fn domain(&self) -> Domain {
        Domain::EquationSolver
    }

    fn domain_prompt(&self) -> &'static str {
        EQUATION_SOLVER_PROMPT
    }

    async fn calculate(
        &self,
        expression: &str,
        _options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        info!(expression, "solving equation");
        self.ctx
            .run(self.domain(), self.domain_prompt(), expression, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResultValue;
    use crate::test_support::{remote_client, ScriptedModel};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn list_of_roots_is_a_sequence() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::json(json!({
            "result": [2, -2],
            "steps": ["x^2 = 4", "x = ±2"],
            "confidence_score": 0.75
        }))]));
        let module =
            EquationSolverModule::new(ModuleContext::new(Arc::new(remote_client(model, 3))));

        let r = module
            .calculate("solve x^2 = 4", &CalculationOptions::default())
            .await
            .unwrap();
        assert_eq!(
            r.result,
            ResultValue::Sequence(vec![2.0.into(), (-2.0).into()])
        );
        assert_eq!(r.result.to_string(), "[2, -2]");
        assert_eq!(r.confidence_score, 0.75);
    }
}
