use std::sync::LazyLock;

use regex::Regex;

use crate::{errors::Error, Result};

// ============== Denylist ==============

/// Substrings that reject an expression outright (matched case-insensitively).
///
/// This is a coarse first-pass filter, not a sandbox: it will also reject
/// harmless text that happens to contain one of these fragments.
pub const FORBIDDEN_PATTERNS: &[&str] = &[
    "eval(",
    "exec(",
    "__import__",
    "os.",
    "subprocess",
    "open(",
    "__builtins__",
    "globals(",
    "locals(",
    "compile(",
];

pub const DEFAULT_MAX_LENGTH: usize = 1000;

static ALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9+\-*/().\s^a-zA-Zπe,;\[\]]+$").expect("valid regex")
});

// ============== Validator ==============

/// Expression checks run before anything reaches a module or the model.
///
/// The three checks are independent; callers pick the ones they need.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Trim the expression and reject empty input or denylisted patterns.
    pub fn sanitize(&self, expression: &str) -> Result<String> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "expression must not be empty".to_string(),
            ));
        }

        let lower = trimmed.to_lowercase();
        for pat in FORBIDDEN_PATTERNS {
            if lower.contains(pat) {
                return Err(Error::SecurityViolation(format!(
                    "forbidden pattern detected: {pat}"
                )));
            }
        }

        Ok(trimmed.to_string())
    }

    pub fn validate_length(&self, expression: &str, max_length: usize) -> Result<()> {
        if expression.chars().count() > max_length {
            return Err(Error::InvalidInput(format!(
                "expression is too long (maximum {max_length} characters)"
            )));
        }
        Ok(())
    }

    pub fn validate_character_set(&self, expression: &str) -> Result<()> {
        if !ALLOWED_CHARS.is_match(expression) {
            return Err(Error::InvalidInput(
                "expression contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}
