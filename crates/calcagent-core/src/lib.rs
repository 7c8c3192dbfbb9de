//! Core pipeline for the natural-language calculator.
//!
//! This crate is provider-agnostic. The hosted model lives behind the
//! `ModelClient` port and is implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod model;
pub mod modules;
pub mod orchestrator;
pub mod parser;
pub mod plot;
pub mod rate_limit;
pub mod security;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
