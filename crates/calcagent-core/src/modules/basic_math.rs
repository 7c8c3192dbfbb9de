use async_trait::async_trait;
use tracing::info;

use super::{prompts::BASIC_MATH_PROMPT, CalculationOptions, DomainModule, ModuleContext};
use crate::{
    domain::{CalculationResult, Domain},
    Result,
};

/// Arithmetic through the shared model flow. Also the fallback module.
pub struct BasicMathModule {
    ctx: ModuleContext,
}

impl BasicMathModule {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DomainModule for BasicMathModule {
    fn domain(&self) -> Domain {
        Domain::BasicMath
    }

    fn domain_prompt(&self) -> &'static str {
        BASIC_MATH_PROMPT
    }

    async fn calculate(
        &self,
        expression: &str,
        _options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        info!(expression, "basic math calculation");
        self.ctx
            .run(self.domain(), self.domain_prompt(), expression, &[])
            .await
    }
}
