//! Per-user conversational state threaded through every pipeline call.

use crate::models::{Entry, InvalidLine, YearMonth};
use serde::Serialize;

/// A partially valid message waiting for the user to confirm or cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConfirmation {
    pub entries: Vec<Entry>,
    pub invalid_lines: Vec<InvalidLine>,
}

/// State owned by the confirmation flow and past mode.
///
/// `past_month` survives across messages until disabled. `last_saved_ids`
/// survives until the next save replaces it or an undo consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub pending: Option<PendingConfirmation>,
    pub past_month: Option<YearMonth>,
    pub last_saved_ids: Vec<i64>,
}

impl SessionState {
    pub fn is_awaiting_confirmation(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_undo_target(&self) -> bool {
        !self.last_saved_ids.is_empty()
    }
}
