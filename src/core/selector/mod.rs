//! Message selectors.
//!
//! A selector is a boolean expression over message headers and properties,
//! written in the SQL-92 subset used by JMS:
//!
//! ```text
//! region = 'eu' AND (weight BETWEEN 1 AND 10 OR urgent) AND name LIKE 'A%'
//! ```
//!
//! Selectors are compiled once, when a receiver or browser is created, so a
//! malformed string is rejected before any message traffic. Evaluation uses
//! three-valued logic: a reference to an absent property yields UNKNOWN,
//! which is a non-match at the top level.

mod eval;
mod lexer;
mod parser;

pub use eval::PropertySource;

use std::fmt;

use crate::core::error::{JmsError, Result};
use eval::Tri;
use parser::Expr;

/// A compiled selector, or the empty selector that matches everything.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    source: Option<String>,
    expr: Option<Expr>,
}

impl Selector {
    /// Selector that matches every message.
    pub fn all() -> Self {
        Self::default()
    }

    /// Compiles `source`. `None`, empty and whitespace-only strings yield
    /// the match-all selector.
    pub fn parse(source: Option<&str>) -> Result<Self> {
        let Some(text) = source.filter(|s| !s.trim().is_empty()) else {
            return Ok(Self::all());
        };

        let expr = lexer::tokenize(text)
            .and_then(parser::parse)
            .map_err(|reason| JmsError::InvalidSelector {
                selector: text.to_string(),
                reason,
            })?;

        Ok(Self {
            source: Some(text.to_string()),
            expr: Some(expr),
        })
    }

    /// Original selector text, `None` for the match-all selector.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_match_all(&self) -> bool {
        self.expr.is_none()
    }

    /// Evaluates the selector; UNKNOWN counts as a non-match.
    pub fn matches(&self, src: &dyn PropertySource) -> bool {
        match &self.expr {
            None => true,
            Some(expr) => eval::evaluate(expr, src) == Tri::True,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source.as_deref().unwrap_or("<all>"))
    }
}
