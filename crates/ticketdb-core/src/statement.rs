//! Parameterized query requests
//!
//! Statement text uses `%s` placeholders; `%%` stands for a literal percent
//! sign. Values are always bound by the driver, never spliced into the text.

use std::borrow::Cow;

use crate::{DbError, Result, Value};

/// An immutable query request: statement text plus ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: Cow<'static, str>,
    params: Vec<Value>,
}

impl Statement {
    /// Create a statement with parameters
    pub fn new(text: impl Into<Cow<'static, str>>, params: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Create a statement without parameters
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// First 100 characters of the text, for log fields
    pub fn preview(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(100)
            .collect()
    }

    /// Count `%s` placeholders, rejecting any other `%` sequence
    pub fn placeholder_count(&self) -> Result<usize> {
        let mut count = 0;
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                continue;
            }
            match chars.next() {
                Some('s') => count += 1,
                Some('%') => {}
                other => {
                    return Err(DbError::Query(format!(
                        "unsupported placeholder '%{}' (use %s for parameters, %% for a literal %)",
                        other.map(String::from).unwrap_or_default()
                    )));
                }
            }
        }
        Ok(count)
    }

    /// Check that every placeholder has exactly one parameter
    pub fn validate(&self) -> Result<()> {
        let expected = self.placeholder_count()?;
        if expected != self.params.len() {
            return Err(DbError::Query(format!(
                "statement has {} placeholder(s) but {} parameter(s) were supplied",
                expected,
                self.params.len()
            )));
        }
        Ok(())
    }

    /// Rewrite `%s` placeholders into a driver's positional syntax.
    ///
    /// `marker` receives the 1-based parameter position, e.g. `|n| format!("${n}")`
    /// for PostgreSQL.
    pub fn render_positional(&self, marker: impl Fn(usize) -> String) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() + 8);
        let mut position = 0;
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('s') => {
                    position += 1;
                    out.push_str(&marker(position));
                }
                Some('%') => out.push('%'),
                other => {
                    return Err(DbError::Query(format!(
                        "unsupported placeholder '%{}'",
                        other.map(String::from).unwrap_or_default()
                    )));
                }
            }
        }
        Ok(out)
    }
}

impl From<&'static str> for Statement {
    fn from(text: &'static str) -> Self {
        Statement::raw(text)
    }
}
