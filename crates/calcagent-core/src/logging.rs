use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize structured logging for the calculator.
///
/// One JSON record per line on stderr (timestamp, level, target, message and
/// fields), so stdout stays reserved for results. `RUST_LOG` overrides `level`.
pub fn init(service_name: &str, level: &str) -> Result<()> {
    let level = level.trim().to_lowercase();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "warn,{service_name}={level},calcagent_core={level},calcagent_gemini={level}"
        ))
        .map_err(|e| Error::Config(format!("invalid log level {level:?}: {e}")))?,
    };

    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install log subscriber: {e}")))
}
