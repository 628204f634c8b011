//! Error taxonomy of the parsing-to-persistence pipeline.

use crate::models::InvalidLine;
use serde::Serialize;
use service_core::error::AppError;
use serde_json::json;
use thiserror::Error;

/// Failure reported by a ledger backend. The batch it belongs to was not
/// applied.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err)
                if db_err.is_check_violation() || db_err.is_foreign_key_violation() =>
            {
                LedgerError::Constraint(db_err.message().to_string())
            }
            other => LedgerError::Database(other.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

/// Limit Guard rejection. Raised before any parsing happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("message is {length} characters long, limit is {max}")]
    MessageTooLong { length: usize, max: usize },

    #[error("message has {count} lines, limit is {max}")]
    TooManyLines { count: usize, max: usize },

    #[error("line is {length} characters long, limit is {max}")]
    LineTooLong {
        line: String,
        length: usize,
        max: usize,
    },
}

/// Everything the pipeline can report instead of a successful outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error("no line of the message could be parsed")]
    NothingParsed { invalid_lines: Vec<InvalidLine> },

    #[error("nothing is waiting for confirmation")]
    NothingToConfirm,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("invalid past month {year}-{month}")]
    InvalidPastMonth { year: i32, month: u32 },

    #[error("nothing was saved: {0}")]
    Storage(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Notice,
    Error,
}

impl PipelineError {
    /// Stable machine-readable identifier for the transport layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Limit(LimitError::MessageTooLong { .. }) => "message_too_long",
            Self::Limit(LimitError::TooManyLines { .. }) => "too_many_lines",
            Self::Limit(LimitError::LineTooLong { .. }) => "line_too_long",
            Self::NothingParsed { .. } => "nothing_parsed",
            Self::NothingToConfirm => "nothing_to_confirm",
            Self::NothingToUndo => "nothing_to_undo",
            Self::InvalidPastMonth { .. } => "invalid_past_month",
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::NothingToConfirm | Self::NothingToUndo => Severity::Notice,
            _ => Severity::Error,
        }
    }

    /// Data the transport needs to render the failure, e.g. the limit that
    /// was hit or the offending line.
    pub fn context(&self) -> serde_json::Value {
        match self {
            Self::Limit(LimitError::MessageTooLong { length, max }) => {
                json!({ "length": length, "max": max })
            }
            Self::Limit(LimitError::TooManyLines { count, max }) => {
                json!({ "count": count, "max": max })
            }
            Self::Limit(LimitError::LineTooLong { line, length, max }) => {
                json!({ "line": line, "length": length, "max": max })
            }
            Self::NothingParsed { invalid_lines } => json!({ "invalid_lines": invalid_lines }),
            Self::InvalidPastMonth { year, month } => json!({ "year": year, "month": month }),
            Self::Storage(err) => json!({ "detail": err.to_string() }),
            Self::NothingToConfirm | Self::NothingToUndo => serde_json::Value::Null,
        }
    }
}
