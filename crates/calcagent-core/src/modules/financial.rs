use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{prompts::FINANCIAL_PROMPT, CalculationOptions, DomainModule, ModuleContext};
use crate::{
    domain::{CalculationResult, Domain},
    Result,
};

pub struct FinancialModule {
    ctx: ModuleContext,
    default_currency: String,
}

impl FinancialModule {
    pub fn new(ctx: ModuleContext, default_currency: impl Into<String>) -> Self {
        Self {
            ctx,
            default_currency: default_currency.into(),
        }
    }
}

#[async_trait]
impl DomainModule for FinancialModule {
    fn domain(&self) -> Domain {
        Domain::Financial
    }

    fn domain_prompt(&self) -> &'static str {
        FINANCIAL_PROMPT
    }

    async fn calculate(
        &self,
        expression: &str,
        options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        let currency = options
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.default_currency.clone());

        info!(expression, currency = %currency, "financial calculation");
        let mut result = self
            .ctx
            .run(
                self.domain(),
                self.domain_prompt(),
                expression,
                &[("currency", currency.as_str())],
            )
            .await?;
        result
            .metadata
            .insert("currency".to_string(), Value::String(currency));
        Ok(result)
    }
}
