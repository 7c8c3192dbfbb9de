//! Free text → `(domain, expression)` routing.
//!
//! Explicit prefixes win over keyword detection, and both tables are scanned in
//! a fixed order so routing is reproducible.

use crate::domain::{Domain, ParsedCommand};

/// Explicit domain markers. First match wins; the marker is stripped.
const PREFIXES: &[(&str, Domain)] = &[
    ("!calculus", Domain::Calculus),
    ("!linalg", Domain::LinearAlgebra),
    ("!solve", Domain::EquationSolver),
    ("!plot", Domain::GraphPlotter),
    ("!finance", Domain::Financial),
];

/// Keyword sets (English + Turkish). Keywords are detection signals only.
const KEYWORDS: &[(Domain, &[&str])] = &[
    (
        Domain::Calculus,
        &["derivative", "integral", "limit", "taylor", "türev"],
    ),
    (
        Domain::LinearAlgebra,
        &[
            "matrix",
            "determinant",
            "eigen",
            "vector",
            "matris",
            "özd",
            "vektör",
        ],
    ),
    (
        Domain::EquationSolver,
        &["solve", "equation", "denklem", "çöz", "coz", "kök"],
    ),
    (
        Domain::GraphPlotter,
        &["plot", "graph", "çiz", "draw", "grafik"],
    ),
    (
        Domain::Financial,
        &["npv", "irr", "loan", "interest", "faiz", "kredi"],
    ),
];

#[derive(Clone, Copy, Debug, Default)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, input: &str) -> ParsedCommand {
        let text = input.trim();
        if text.is_empty() {
            return ParsedCommand {
                domain: Domain::BasicMath,
                expression: String::new(),
            };
        }

        for (prefix, domain) in PREFIXES {
            if let Some(rest) = strip_prefix_ignore_case(text, prefix) {
                return ParsedCommand {
                    domain: *domain,
                    expression: rest.trim().to_string(),
                };
            }
        }

        let lower = text.to_lowercase();
        for (domain, keywords) in KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return ParsedCommand {
                    domain: *domain,
                    expression: text.to_string(),
                };
            }
        }

        ParsedCommand {
            domain: Domain::BasicMath,
            expression: text.to_string(),
        }
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> (Domain, String) {
        let p = CommandParser::new().parse(s);
        (p.domain, p.expression)
    }

    #[test]
    fn empty_input_is_basic_math() {
        assert_eq!(parse(""), (Domain::BasicMath, String::new()));
        assert_eq!(parse("   \t"), (Domain::BasicMath, String::new()));
    }

    #[test]
    fn prefix_is_stripped_and_routes() {
        assert_eq!(
            parse("!calculus derivative x^2"),
            (Domain::Calculus, "derivative x^2".to_string())
        );
        assert_eq!(
            parse("  !LINALG determinant [[1,2],[3,4]]"),
            (Domain::LinearAlgebra, "determinant [[1,2],[3,4]]".to_string())
        );
        assert_eq!(parse("!solve x+1=0"), (Domain::EquationSolver, "x+1=0".to_string()));
        assert_eq!(parse("!plot sin(x)"), (Domain::GraphPlotter, "sin(x)".to_string()));
        assert_eq!(parse("!Finance npv 5%"), (Domain::Financial, "npv 5%".to_string()));
    }

    #[test]
    fn prefix_wins_over_keywords_in_remainder() {
        assert_eq!(
            parse("!finance plot the matrix derivative"),
            (Domain::Financial, "plot the matrix derivative".to_string())
        );
    }

    #[test]
    fn keywords_route_without_stripping() {
        assert_eq!(
            parse("matrix multiply [[1,2],[3,4]] * [[5,6],[7,8]]"),
            (
                Domain::LinearAlgebra,
                "matrix multiply [[1,2],[3,4]] * [[5,6],[7,8]]".to_string()
            )
        );
        assert_eq!(
            parse("Türev of x^3"),
            (Domain::Calculus, "Türev of x^3".to_string())
        );
        assert_eq!(
            parse("loan of 1000 at 5%"),
            (Domain::Financial, "loan of 1000 at 5%".to_string())
        );
    }

    #[test]
    fn first_domain_in_order_wins() {
        // Both calculus ("integral") and graph ("plot") match; calculus is earlier.
        assert_eq!(parse("plot the integral of x").0, Domain::Calculus);
        // Linear algebra precedes equation solving.
        assert_eq!(parse("solve the matrix").0, Domain::LinearAlgebra);
    }

    #[test]
    fn unmatched_input_is_basic_math_unchanged() {
        assert_eq!(parse("2 + 2"), (Domain::BasicMath, "2 + 2".to_string()));
        assert_eq!(
            parse("os.system('rm -rf /')"),
            (Domain::BasicMath, "os.system('rm -rf /')".to_string())
        );
    }

    #[test]
    fn prefix_check_is_char_boundary_safe() {
        assert_eq!(parse("çççç").0, Domain::BasicMath);
    }
}
