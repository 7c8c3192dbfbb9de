use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::formatting::format_number;

/// Calculation category a command is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    BasicMath,
    Calculus,
    LinearAlgebra,
    Financial,
    GraphPlotter,
    EquationSolver,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::BasicMath,
        Domain::Calculus,
        Domain::LinearAlgebra,
        Domain::Financial,
        Domain::GraphPlotter,
        Domain::EquationSolver,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::BasicMath => "basic_math",
            Domain::Calculus => "calculus",
            Domain::LinearAlgebra => "linear_algebra",
            Domain::Financial => "financial",
            Domain::GraphPlotter => "graph_plotter",
            Domain::EquationSolver => "equation_solver",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the command parser: where to route, and what to compute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub domain: Domain,
    pub expression: String,
}

/// The headline value of a calculation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
    Sequence(Vec<ResultValue>),
}

impl ResultValue {
    /// Numeric view of the value. Text that parses as a number counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(n) => Some(*n),
            ResultValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            ResultValue::Sequence(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResultValue::Number(_) => false,
            ResultValue::Text(s) => s.trim().is_empty(),
            ResultValue::Sequence(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(n) => f.write_str(&format_number(*n)),
            ResultValue::Text(s) => f.write_str(s),
            ResultValue::Sequence(items) => {
                let parts = items.iter().map(|i| i.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<f64> for ResultValue {
    fn from(n: f64) -> Self {
        ResultValue::Number(n)
    }
}

impl From<String> for ResultValue {
    fn from(s: String) -> Self {
        ResultValue::Text(s)
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        ResultValue::Text(s.to_string())
    }
}

/// Structured, displayable outcome of one command.
///
/// `steps` is always plain strings: whatever shape the model answered with is
/// flattened by `modules::normalize_response` before a result is built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculationResult {
    pub result: ResultValue,
    pub steps: Vec<String>,
    pub confidence_score: f64,
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_data: Option<Map<String, Value>>,
    pub metadata: Map<String, Value>,
}

impl CalculationResult {
    pub fn new(domain: Domain, result: impl Into<ResultValue>, steps: Vec<String>) -> Self {
        Self {
            result: result.into(),
            steps,
            confidence_score: 1.0,
            domain,
            visual_data: None,
            metadata: Map::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = clamp_confidence(confidence);
        self
    }

    pub fn with_visual_data(mut self, visual_data: Map<String, Value>) -> Self {
        self.visual_data = Some(visual_data);
        self
    }

    /// Path of the rendered PNG, if this result carries one.
    pub fn plot_png(&self) -> Option<&str> {
        self.visual_data
            .as_ref()?
            .get("plot_paths")?
            .get("png")?
            .as_str()
    }
}

pub(crate) fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        return 1.0;
    }
    c.clamp(0.0, 1.0)
}
