//! Parsed expense lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single `(label, amount)` pair extracted from a message line.
///
/// Negative and zero amounts are valid; negatives record corrections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub amount: Decimal,
}

impl Entry {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }

    /// Text stored in the ledger for this entry: `"<label> <amount>"`.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.label, self.amount)
    }
}

/// A line that did not match the entry grammar. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidLine {
    pub raw_text: String,
}

impl InvalidLine {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
        }
    }
}

/// Output of the parser, both lists in message order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub entries: Vec<Entry>,
    pub invalid_lines: Vec<InvalidLine>,
}

impl ParseResult {
    pub fn has_invalid(&self) -> bool {
        !self.invalid_lines.is_empty()
    }
}
