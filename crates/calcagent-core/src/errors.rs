/// Core error type for the calculator pipeline.
///
/// Adapter crates map their specific failures into this type so the
/// orchestrator can turn every kind into a distinct user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed, empty, too long, or illegal-character expression.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A denylisted pattern was found in the expression.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// The routed domain has no loaded module and no fallback exists.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Any unrecoverable failure inside a domain module.
    #[error("calculation error: {0}")]
    Calculation(String),

    /// Text generation exhausted its retry budget.
    #[error("remote model error: {0}")]
    RemoteModel(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
