//! Request pipeline: parse -> sanitize -> route -> calculate -> format.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use tracing::{error, info, warn};

use crate::{
    config::Config,
    domain::{CalculationResult, Domain},
    errors::Error,
    formatting::format_report,
    model::{client::ModelClient, remote::RemoteModelClient},
    modules::{
        BasicMathModule, CalculationOptions, CalculusModule, DomainModule, EquationSolverModule,
        FinancialModule, GraphPlotterModule, LinearAlgebraModule, ModuleContext,
    },
    parser::CommandParser,
    security::InputValidator,
    Result,
};

/// Where and how the graph plotter keeps its files.
#[derive(Clone, Debug)]
pub struct PlotCacheSettings {
    pub dir: PathBuf,
    pub capacity: usize,
}

/// One instance of every domain module, sharing a single model client.
pub fn standard_modules(
    model: Arc<RemoteModelClient>,
    default_currency: &str,
    plots: &PlotCacheSettings,
) -> Result<Vec<Arc<dyn DomainModule>>> {
    let ctx = ModuleContext::new(model);
    let modules: Vec<Arc<dyn DomainModule>> = vec![
        Arc::new(BasicMathModule::new(ctx.clone())),
        Arc::new(CalculusModule::new(ctx.clone())),
        Arc::new(LinearAlgebraModule::new(ctx.clone())),
        Arc::new(FinancialModule::new(ctx.clone(), default_currency)),
        Arc::new(GraphPlotterModule::new(
            ctx.clone(),
            plots.dir.clone(),
            plots.capacity,
        )?),
        Arc::new(EquationSolverModule::new(ctx)),
    ];
    Ok(modules)
}

pub struct Orchestrator {
    parser: CommandParser,
    validator: InputValidator,
    modules: BTreeMap<Domain, Arc<dyn DomainModule>>,
    options: CalculationOptions,
}

impl Orchestrator {
    pub fn new(modules: Vec<Arc<dyn DomainModule>>) -> Self {
        let modules = modules
            .into_iter()
            .map(|m| (m.domain(), m))
            .collect::<BTreeMap<_, _>>();
        info!(
            modules = ?modules.keys().map(|d| d.as_str()).collect::<Vec<_>>(),
            "orchestrator ready"
        );
        Self {
            parser: CommandParser::new(),
            validator: InputValidator::new(),
            modules,
            options: CalculationOptions::default(),
        }
    }

    /// Options handed to every `calculate` call.
    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_config(cfg: &Config, model: Arc<dyn ModelClient>) -> Result<Self> {
        let remote = Arc::new(RemoteModelClient::from_config(cfg, model));
        let plots = PlotCacheSettings {
            dir: cfg.plot_cache_dir.clone(),
            capacity: cfg.plot_cache_capacity,
        };
        let modules = standard_modules(remote, &cfg.default_currency, &plots)?;
        Ok(Self::new(modules))
    }

    pub fn loaded_domains(&self) -> Vec<Domain> {
        self.modules.keys().copied().collect()
    }

    /// Module for `domain`, or basic_math when that domain is not loaded.
    pub fn resolve(&self, domain: Domain) -> Result<Arc<dyn DomainModule>> {
        if let Some(m) = self.modules.get(&domain) {
            return Ok(m.clone());
        }
        if let Some(m) = self.modules.get(&Domain::BasicMath) {
            warn!(requested = %domain, "module not loaded; falling back to basic_math");
            return Ok(m.clone());
        }
        Err(Error::ModuleNotFound(domain.to_string()))
    }

    /// Run one command to a structured result.
    pub async fn execute(&self, input: &str) -> Result<CalculationResult> {
        let parsed = self.parser.parse(input);
        info!(domain = %parsed.domain, expression = %parsed.expression, "command parsed");

        let expression = self.validator.sanitize(&parsed.expression)?;
        let module = self.resolve(parsed.domain)?;
        module.calculate(&expression, &self.options).await
    }

    /// Run one command to display text. `None` only for blank input.
    ///
    /// Every failure becomes a message; nothing propagates to the caller.
    pub async fn process_command(&self, input: &str) -> Option<String> {
        if input.trim().is_empty() {
            return None;
        }

        match self.execute(input).await {
            Ok(result) => {
                info!(domain = %result.domain, "command completed");
                Some(format_report(&result))
            }
            Err(e) => {
                if is_expected(&e) {
                    warn!(error = %e, "command failed");
                } else {
                    error!(error = ?e, "unexpected failure while processing command");
                }
                Some(user_message(&e))
            }
        }
    }
}

fn is_expected(e: &Error) -> bool {
    matches!(
        e,
        Error::InvalidInput(_)
            | Error::SecurityViolation(_)
            | Error::ModuleNotFound(_)
            | Error::Calculation(_)
            | Error::RemoteModel(_)
    )
}

/// Prefixed, user-facing text for a failed command.
pub fn user_message(e: &Error) -> String {
    match e {
        Error::SecurityViolation(msg) => format!("❌ Security error: {msg}"),
        Error::InvalidInput(msg) => format!("⚠️ Invalid input: {msg}"),
        Error::ModuleNotFound(msg) => format!("🔍 Module error: no module for {msg}"),
        Error::Calculation(msg) => format!("🧮 Calculation error: {msg}"),
        Error::RemoteModel(msg) => format!("📡 Model error: {msg}"),
        other => format!("💥 Unexpected error: {other}"),
    }
}
