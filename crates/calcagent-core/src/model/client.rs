use async_trait::async_trait;

use crate::{errors::Error, Result};

use super::types::*;

/// Hexagonal port for the hosted language model.
///
/// Implementations perform exactly one remote call per `generate`; retries,
/// pacing and response acceptance live in `RemoteModelClient`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(Error::External(format!(
            "model listing is not supported by {}",
            self.model_name()
        )))
    }
}
