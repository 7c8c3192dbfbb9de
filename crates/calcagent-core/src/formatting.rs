//! Formatting utilities (numbers, JSON values, the final user report).

use serde_json::Value;

use crate::domain::CalculationResult;

/// Confidence scores below this are shown to the user.
pub const CONFIDENCE_VISIBILITY_THRESHOLD: f64 = 0.8;

const SEPARATOR_WIDTH: usize = 50;

/// Render a number for humans: integral values without a fraction, everything
/// else with up to 6 decimals and no trailing zeros.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let fixed = format!("{n:.6}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        return "0".to_string();
    }
    trimmed.to_string()
}

/// String form of a JSON value as it should appear in a result or step.
///
/// Strings are shown verbatim (no quotes); everything else is compact JSON.
pub fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Build the multi-section report printed for a successful calculation.
pub fn format_report(result: &CalculationResult) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let mut out = vec![
        separator.clone(),
        format!("🤖 Module: {}", result.domain.as_str().to_uppercase()),
        separator.clone(),
    ];

    if result.result.is_empty() {
        out.push("ℹ️  Result: (informational reply)".to_string());
    } else {
        out.push(format!("🎯 Result: {}", result.result));
    }

    if !result.steps.is_empty() {
        out.push(String::new());
        out.push("📝 Steps:".to_string());
        for (i, step) in result.steps.iter().enumerate() {
            out.push(format!("  {}. {}", i + 1, step.trim()));
        }
    }

    if result.confidence_score < CONFIDENCE_VISIBILITY_THRESHOLD {
        out.push(String::new());
        out.push(format!("⚠️ Confidence: {:.2}", result.confidence_score));
    }

    if let Some(png) = result.plot_png() {
        out.push(String::new());
        out.push(format!("📈 Plot created: {png}"));
    }

    out.push(separator);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, ResultValue};
    use serde_json::{json, Map};

    #[test]
    fn numbers_render_compactly() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(1.9), "1.9");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(-0.0000001), "0");
    }

    #[test]
    fn values_render_without_quotes() {
        assert_eq!(value_to_display(&json!("x^2")), "x^2");
        assert_eq!(value_to_display(&json!(2)), "2");
        assert_eq!(value_to_display(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn report_lists_steps_and_low_confidence() {
        let r = CalculationResult::new(
            Domain::Calculus,
            1.9,
            vec!["d/dx x^2 = 2x".to_string(), " evaluate ".to_string()],
        )
        .with_confidence(0.5);

        let text = format_report(&r);
        assert!(text.contains("🤖 Module: CALCULUS"));
        assert!(text.contains("🎯 Result: 1.9"));
        assert!(text.contains("  1. d/dx x^2 = 2x"));
        assert!(text.contains("  2. evaluate"));
        assert!(text.contains("⚠️ Confidence: 0.50"));
    }

    #[test]
    fn report_hides_high_confidence_and_shows_plot() {
        let mut visual = Map::new();
        visual.insert("plot_paths".to_string(), json!({"png": "cache/plots/a.png"}));
        let r = CalculationResult::new(Domain::GraphPlotter, "done", vec![])
            .with_confidence(0.95)
            .with_visual_data(visual);

        let text = format_report(&r);
        assert!(!text.contains("Confidence"));
        assert!(!text.contains("Steps"));
        assert!(text.contains("📈 Plot created: cache/plots/a.png"));
    }

    #[test]
    fn empty_result_is_marked_informational() {
        let r = CalculationResult::new(Domain::BasicMath, ResultValue::Text(String::new()), vec![]);
        assert!(format_report(&r).contains("(informational reply)"));
    }
}
