//! Structured replies handed to the transport layer for rendering.

use crate::error::{PipelineError, Severity};
use crate::models::{Entry, InvalidLine, PendingConfirmation, YearMonth};
use crate::services::{CommitSummary, IngestOutcome, UndoSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ignored,
    Committed {
        count: usize,
        entries: Vec<Entry>,
        ids: Vec<i64>,
        recorded_at: DateTime<Utc>,
        past_month: Option<YearMonth>,
    },
    AwaitingConfirmation {
        entries: Vec<Entry>,
        invalid_lines: Vec<InvalidLine>,
    },
    Cancelled {
        discarded: bool,
    },
    Undone {
        requested: usize,
        deleted: u64,
    },
    PastModeEnabled {
        past_month: YearMonth,
    },
    PastModeDisabled {
        previous: Option<YearMonth>,
    },
    Rejected {
        kind: &'static str,
        severity: Severity,
        message: String,
        context: serde_json::Value,
    },
}

impl Reply {
    pub fn access_denied(user_id: i64) -> Self {
        Reply::Rejected {
            kind: "access_denied",
            severity: Severity::Error,
            message: format!("user {} is not allowed to record expenses", user_id),
            context: serde_json::Value::Null,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Ignored => "ignored",
            Reply::Committed { .. } => "committed",
            Reply::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Reply::Cancelled { .. } => "cancelled",
            Reply::Undone { .. } => "undone",
            Reply::PastModeEnabled { .. } => "past_mode_enabled",
            Reply::PastModeDisabled { .. } => "past_mode_disabled",
            Reply::Rejected { kind, .. } => kind,
        }
    }
}

impl From<CommitSummary> for Reply {
    fn from(summary: CommitSummary) -> Self {
        Reply::Committed {
            count: summary.count(),
            entries: summary.entries,
            ids: summary.ids,
            recorded_at: summary.recorded_at,
            past_month: summary.past_month,
        }
    }
}

impl From<PendingConfirmation> for Reply {
    fn from(pending: PendingConfirmation) -> Self {
        Reply::AwaitingConfirmation {
            entries: pending.entries,
            invalid_lines: pending.invalid_lines,
        }
    }
}

impl From<IngestOutcome> for Reply {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Ignored => Reply::Ignored,
            IngestOutcome::Committed(summary) => summary.into(),
            IngestOutcome::AwaitingConfirmation(pending) => pending.into(),
        }
    }
}

impl From<UndoSummary> for Reply {
    fn from(summary: UndoSummary) -> Self {
        Reply::Undone {
            requested: summary.requested,
            deleted: summary.deleted,
        }
    }
}

impl From<PipelineError> for Reply {
    fn from(err: PipelineError) -> Self {
        Reply::Rejected {
            kind: err.kind(),
            severity: err.severity(),
            message: err.to_string(),
            context: err.context(),
        }
    }
}

impl<T: Into<Reply>> From<Result<T, PipelineError>> for Reply {
    fn from(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimitError;
    use rust_decimal::Decimal;

    #[test]
    fn rejected_reply_serializes_kind_and_context() {
        let err: PipelineError = LimitError::TooManyLines { count: 101, max: 100 }.into();
        let json = serde_json::to_value(Reply::from(err)).unwrap();

        assert_eq!(json["status"], "rejected");
        assert_eq!(json["kind"], "too_many_lines");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["context"]["max"], 100);
    }

    #[test]
    fn nothing_to_undo_is_a_notice() {
        let reply = Reply::from(Err::<UndoSummary, _>(PipelineError::NothingToUndo));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["severity"], "notice");
        assert_eq!(reply.kind(), "nothing_to_undo");
    }

    #[test]
    fn staged_reply_lists_both_sides() {
        let reply = Reply::from(IngestOutcome::AwaitingConfirmation(PendingConfirmation {
            entries: vec![Entry::new("Tea", Decimal::from(5))],
            invalid_lines: vec![InvalidLine::new("oops")],
        }));
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json["status"], "awaiting_confirmation");
        assert_eq!(json["entries"][0]["label"], "Tea");
        assert_eq!(json["invalid_lines"][0]["raw_text"], "oops");
    }
}
