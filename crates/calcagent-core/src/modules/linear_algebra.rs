//! Local matrix arithmetic: `A * B` products and `determinant M`.
//!
//! Operands are JSON-style nested numeric literals. They are parsed as data,
//! never evaluated, and the model is not consulted.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use super::{CalculationOptions, DomainModule, ModuleContext};
use crate::{
    domain::{CalculationResult, Domain, ResultValue},
    errors::Error,
    formatting::format_number,
    Result,
};

const UNSUPPORTED: &str = "Unsupported linear algebra expression";
const DETERMINANT: &str = "determinant";

type Matrix = Vec<Vec<f64>>;

pub struct LinearAlgebraModule {
    ctx: ModuleContext,
}

impl LinearAlgebraModule {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DomainModule for LinearAlgebraModule {
    fn domain(&self) -> Domain {
        Domain::LinearAlgebra
    }

    /// No prompt: everything is computed locally.
    fn domain_prompt(&self) -> &'static str {
        ""
    }

    async fn calculate(
        &self,
        expression: &str,
        _options: &CalculationOptions,
    ) -> Result<CalculationResult> {
        let expression = self.ctx.validate_input(expression)?;
        info!(expression = %expression, "linear algebra calculation");

        evaluate(&expression).inspect_err(|e| {
            error!(error = %e, "linear algebra calculation failed");
        })
    }
}

fn evaluate(expression: &str) -> Result<CalculationResult> {
    if let Some((left, right)) = expression.split_once('*') {
        let a = parse_operand(left, Orientation::Row)?;
        let b = parse_operand(right, Orientation::Column)?;
        let product = multiply(&a, &b)?;
        let flat = product
            .into_iter()
            .flatten()
            .map(ResultValue::Number)
            .collect::<Vec<_>>();

        let steps = vec![
            format!("Parsed A = {}", render_matrix(&a)),
            format!("Parsed B = {}", render_matrix(&b)),
            "Performed matrix multiplication A × B".to_string(),
        ];
        return Ok(CalculationResult::new(
            Domain::LinearAlgebra,
            ResultValue::Sequence(flat),
            steps,
        ));
    }

    if let Some(rest) = strip_prefix_ignore_case(expression, DETERMINANT) {
        let m = parse_operand(rest, Orientation::Row)?;
        let det = determinant(&m)?;
        let steps = vec![
            format!("Parsed matrix M = {}", render_matrix(&m)),
            "Computed determinant by Gaussian elimination".to_string(),
        ];
        return Ok(CalculationResult::new(Domain::LinearAlgebra, det, steps));
    }

    Err(Error::Calculation(UNSUPPORTED.to_string()))
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// How a one-dimensional literal is shaped into a matrix.
#[derive(Clone, Copy)]
enum Orientation {
    Row,
    Column,
}

fn parse_operand(text: &str, orientation: Orientation) -> Result<Matrix> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(Error::Calculation(format!(
            "no matrix literal in {:?}",
            text.trim()
        )));
    };
    if end < start {
        return Err(Error::Calculation(format!(
            "malformed matrix literal {:?}",
            text.trim()
        )));
    }

    let literal = &text[start..=end];
    let value: Value = serde_json::from_str(literal)
        .map_err(|e| Error::Calculation(format!("cannot parse {literal:?}: {e}")))?;
    let Value::Array(items) = value else {
        return Err(Error::Calculation(format!("{literal:?} is not a matrix")));
    };
    if items.is_empty() {
        return Err(Error::Calculation("empty matrix".to_string()));
    }

    if items.iter().all(Value::is_array) {
        let rows = items
            .iter()
            .map(|row| numeric_row(row, literal))
            .collect::<Result<Matrix>>()?;
        let width = rows[0].len();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(Error::Calculation(format!(
                "{literal:?} is not a rectangular matrix"
            )));
        }
        return Ok(rows);
    }

    let vector = numeric_row(&Value::Array(items), literal)?;
    Ok(match orientation {
        Orientation::Row => vec![vector],
        Orientation::Column => vector.into_iter().map(|x| vec![x]).collect(),
    })
}

fn numeric_row(row: &Value, literal: &str) -> Result<Vec<f64>> {
    let Value::Array(cells) = row else {
        return Err(Error::Calculation(format!("{literal:?} mixes rows and numbers")));
    };
    cells
        .iter()
        .map(|c| {
            c.as_f64()
                .ok_or_else(|| Error::Calculation(format!("non-numeric entry {c} in {literal:?}")))
        })
        .collect()
}

fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let inner = a[0].len();
    if inner != b.len() {
        return Err(Error::Calculation(format!(
            "shapes {}x{} and {}x{} not aligned",
            a.len(),
            inner,
            b.len(),
            b[0].len()
        )));
    }

    let cols = b[0].len();
    Ok(a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| row.iter().zip(b).map(|(x, b_row)| x * b_row[j]).sum::<f64>())
                .collect()
        })
        .collect())
}

/// Determinant via Gaussian elimination with partial pivoting.
fn determinant(m: &Matrix) -> Result<f64> {
    let n = m.len();
    if m.iter().any(|row| row.len() != n) {
        return Err(Error::Calculation(format!(
            "determinant needs a square matrix, got {}x{}",
            n,
            m[0].len()
        )));
    }

    let mut a = m.clone();
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col] == 0.0 {
            return Ok(0.0);
        }
        if pivot != col {
            a.swap(pivot, col);
            det = -det;
        }

        det *= a[col][col];
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    Ok(det)
}

fn render_matrix(m: &Matrix) -> String {
    let rows = m
        .iter()
        .map(|row| {
            let cells = row.iter().map(|x| format_number(*x)).collect::<Vec<_>>();
            format!("[{}]", cells.join(", "))
        })
        .collect::<Vec<_>>();
    format!("[{}]", rows.join(", "))
}
