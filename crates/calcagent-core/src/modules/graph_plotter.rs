use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use sieve_cache::SieveCache;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{
    normalize_response, prompts::GRAPH_PLOTTER_PROMPT, CalculationOptions, DomainModule,
    ModuleContext,
};
use crate::{
    domain::{CalculationResult, Domain},
    errors::Error,
    formatting::format_number,
    model::remote::StructuredOutput,
    plot::{render_curve, sample_curve, DEFAULT_HEIGHT, DEFAULT_SAMPLES, DEFAULT_WIDTH},
    utils::iso_timestamp_utc,
    Result,
};

pub const DEFAULT_X_RANGE: (f64, f64) = (-10.0, 10.0);

const CACHE_HIT_RESULT: &str = "Plot generated (cache)";
const CACHE_FILE_PREFIX: &str = "plot-v1-";

/// Plots a 2-D curve to PNG and remembers where each plot was written.
///
/// The cache maps the lower-cased expression plus the x window to a file
/// under `cache_dir` and is bounded with SIEVE eviction. Only fully written
/// files are cached; a failed model call is never rendered.
pub struct GraphPlotterModule {
    ctx: ModuleContext,
    cache_dir: PathBuf,
    cache: Mutex<SieveCache<String, PathBuf>>,
}

impl GraphPlotterModule {
    pub fn new(ctx: ModuleContext, cache_dir: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let cache = SieveCache::new(capacity)
            .map_err(|e| Error::Config(format!("could not initialize plot cache: {e}")))?;
        Ok(Self {
            ctx,
            cache_dir: cache_dir.into(),
            cache: Mutex::new(cache),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn cached_path(&self, key: &String) -> Option<PathBuf> {
        let path = self.cache.lock().await.get(key).cloned()?;
        if tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            Some(path)
        } else {
            warn!(path = %path.display(), "cached plot file is gone; re-rendering");
            None
        }
    }

    async fn render(
        &self,
        key: &str,
        expression: &str,
        range: (f64, f64),
    ) -> Result<CalculationResult> {
        let x_min = format_number(range.0);
        let x_max = format_number(range.1);
        let output = self
            .ctx
            .call_structured(
                self.domain_prompt(),
                expression,
                &[("x_min", x_min.as_str()), ("x_max", x_max.as_str())],
            )
            .await?;
        let raw = match output {
            StructuredOutput::Data(raw) => raw,
            StructuredOutput::Failed { error, .. } => {
                return Err(Error::Calculation(format!(
                    "model did not describe the plot: {error}"
                )));
            }
        };
        let mut result = normalize_response(raw, Domain::GraphPlotter);
        let mut visual = result.visual_data.take().unwrap_or_default();

        let (points, source) = match model_points(&visual) {
            Some(points) => (points, "model"),
            None => (sample_curve(range, DEFAULT_SAMPLES, |x| x * x), "default"),
        };

        let png = render_curve(&points, DEFAULT_WIDTH, DEFAULT_HEIGHT)
            .map_err(|e| Error::Calculation(format!("could not draw plot: {e}")))?;
        let path = self
            .write_plot(key, png)
            .await
            .map_err(|e| Error::Calculation(format!("could not save plot: {e}")))?;

        visual.insert(
            "plot_paths".to_string(),
            json!({ "png": path.display().to_string() }),
        );
        visual.insert("generated_at".to_string(), Value::String(iso_timestamp_utc()));
        visual.insert("x_range".to_string(), json!([range.0, range.1]));
        visual.insert("point_source".to_string(), Value::String(source.to_string()));
        result.visual_data = Some(visual);

        self.cache.lock().await.insert(key.to_string(), path);
        Ok(result)
    }

    /// Write to a fresh temp file in `cache_dir`, then persist it over the
    /// final path. A failed write never leaves a partial PNG behind, and
    /// concurrent writers of the same plot each get their own temp file.
    async fn write_plot(&self, key: &str, png: Vec<u8>) -> Result<PathBuf> {
        let dir = self.cache_dir.clone();
        let final_path = dir.join(plot_file_name(key));
        let target = final_path.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&png)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::External(format!("plot writer task failed: {e}")))??;

        Ok(final_path)
    }
}

#[async_trait]
impl DomainModule for GraphPlotterModule {
    fn domain(&self) -> Domain {
        Domain::GraphPlotter
    }

    fn domain_prompt(&self) -> &'static str {
        GRAPH_PLOTTER_PROMPT
    }

    async fn calculate(
        &self,
        expression: &str,
        options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        let expression = self.ctx.validate_input(expression)?;
        info!(expression = %expression, "graph plotting");

        let range = options.x_range.unwrap_or(DEFAULT_X_RANGE);
        if !(range.0.is_finite() && range.1.is_finite() && range.0 < range.1) {
            return Err(Error::Calculation(format!(
                "invalid plot window [{}, {}]",
                range.0, range.1
            )));
        }

        let key = cache_key(&expression, range);
        if let Some(path) = self.cached_path(&key).await {
            info!(path = %path.display(), "using cached plot");
            return Ok(cached_result(&path));
        }

        self.render(&key, &expression, range).await.inspect_err(|e| {
            error!(error = %e, "graph plotting failed");
        })
    }
}

fn cached_result(path: &Path) -> CalculationResult {
    let mut visual = Map::new();
    visual.insert(
        "plot_paths".to_string(),
        json!({ "png": path.display().to_string() }),
    );
    CalculationResult::new(
        Domain::GraphPlotter,
        CACHE_HIT_RESULT,
        vec!["Loaded from cache".to_string()],
    )
    .with_visual_data(visual)
}

/// `visual_data.points` as `[[x, y], ...]`, if it holds at least two usable points.
fn model_points(visual: &Map<String, Value>) -> Option<Vec<(f64, f64)>> {
    let items = visual.get("points")?.as_array()?;
    let points = items
        .iter()
        .filter_map(|p| {
            let pair = p.as_array()?;
            match pair.as_slice() {
                [x, y] => Some((x.as_f64()?, y.as_f64()?)),
                _ => None,
            }
        })
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect::<Vec<_>>();
    (points.len() >= 2).then_some(points)
}

/// Lower-cased expression plus the window it is drawn over.
fn cache_key(expression: &str, range: (f64, f64)) -> String {
    format!(
        "{} [{}, {}]",
        expression.trim().to_lowercase(),
        format_number(range.0),
        format_number(range.1)
    )
}

/// Content-addressed, versioned file name for a cache key.
fn plot_file_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut name = String::with_capacity(CACHE_FILE_PREFIX.len() + 64 + 4);
    name.push_str(CACHE_FILE_PREFIX);
    for b in digest.iter() {
        let _ = write!(&mut name, "{b:02x}");
    }
    name.push_str(".png");
    name
}
