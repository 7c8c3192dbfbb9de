//! `calcagent`: natural-language calculator CLI.
//!
//! No expression starts the interactive prompt; an expression runs once.

mod diagnostics;
mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use calcagent_core::{
    config::Config, model::client::ModelClient, modules::CalculationOptions,
    orchestrator::Orchestrator,
};
use calcagent_gemini::{GeminiClient, GeminiConfig};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "calcagent")]
#[command(version, about = "Natural-language calculator backed by Gemini")]
#[command(long_about = r#"
Routes a free-text command to a calculation module (basic math, calculus,
linear algebra, finance, plotting, equation solving) and prints the result.

Prefixes force a module: !calculus, !linalg, !solve, !plot, !finance.

Example:
  calcagent "!calculus derivative of x^2 at x = 1"
  calcagent "matrix [[1,2],[3,4]] * [[5,6],[7,8]]"
  calcagent --check-key
"#)]
struct Cli {
    /// Expression to evaluate once (interactive mode when omitted)
    #[arg(value_name = "EXPRESSION", trailing_var_arg = true, allow_hyphen_values = true)]
    expression: Vec<String>,

    /// List models that support generateContent and exit
    #[arg(long, conflicts_with = "check_key")]
    list_models: bool,

    /// Report on the configured API key and exit
    #[arg(long)]
    check_key: bool,

    /// Currency for financial calculations (overrides DEFAULT_CURRENCY)
    #[arg(long, value_name = "CODE")]
    currency: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.check_key {
        diagnostics::check_key()?;
        return Ok(());
    }

    let cfg = Config::load().context("loading configuration")?;
    calcagent_core::logging::init("calcagent", &cfg.log_level)?;
    info!(config = ?cfg, "configuration loaded");

    let gemini = Arc::new(GeminiClient::new(GeminiConfig::from_config(&cfg))?);

    if cli.list_models {
        return list_models(gemini.as_ref()).await;
    }

    let orchestrator = Orchestrator::from_config(&cfg, gemini)?.with_options(CalculationOptions {
        currency: cli.currency,
        ..CalculationOptions::default()
    });

    if cli.expression.is_empty() {
        return repl::run(&orchestrator).await;
    }

    let input = cli.expression.join(" ");
    if let Some(text) = orchestrator.process_command(&input).await {
        println!("{text}");
    }
    Ok(())
}

async fn list_models(client: &dyn ModelClient) -> Result<()> {
    println!("🔍 Models available to this key:\n");
    let models = client.list_models().await.context("listing models")?;

    let usable = models
        .iter()
        .filter(|m| m.supports_generate_content())
        .collect::<Vec<_>>();
    if usable.is_empty() {
        println!("⚠️ No model supports generateContent. Check the API key permissions.");
        return Ok(());
    }

    for m in usable {
        match &m.display_name {
            Some(display) => println!("✅ {} ({display})", m.name),
            None => println!("✅ {}", m.name),
        }
    }
    Ok(())
}
