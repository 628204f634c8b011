//! Confirmation state machine: ingest, confirm, cancel, undo and past mode.
//!
//! Every call receives the caller's `SessionState` explicitly. The transport
//! layer is responsible for delivering one call per user at a time.

use crate::error::PipelineError;
use crate::models::{Entry, PendingConfirmation, SessionState, YearMonth};
use crate::services::dates::resolve_timestamp;
use crate::services::ledger::LedgerStore;
use crate::services::limits::{check_limits, Guarded};
use crate::services::metrics::{
    BATCHES_COMMITTED_TOTAL, CONFIRMATIONS_STAGED_TOTAL, ENTRIES_COMMITTED_TOTAL,
    PIPELINE_REJECTIONS_TOTAL, UNDO_TOTAL,
};
use crate::services::parser::parse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Source of "now" for unstamped saves.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of feeding one message into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// No text to parse. Nothing happened.
    Ignored,
    /// Every line parsed and the batch was saved.
    Committed(CommitSummary),
    /// Some lines were invalid; the valid ones wait for confirm or cancel.
    AwaitingConfirmation(PendingConfirmation),
}

/// A saved batch, entries in message order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub ids: Vec<i64>,
    pub entries: Vec<Entry>,
    pub recorded_at: DateTime<Utc>,
    pub past_month: Option<YearMonth>,
}

impl CommitSummary {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UndoSummary {
    /// Ids the undo targeted.
    pub requested: usize,
    /// Rows actually removed; lower when some were already gone.
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy)]
enum CommitPath {
    Auto,
    Confirm,
}

impl CommitPath {
    fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Confirm => "confirm",
        }
    }
}

fn rejected(err: PipelineError) -> PipelineError {
    PIPELINE_REJECTIONS_TOTAL
        .with_label_values(&[err.kind()])
        .inc();
    err
}

/// Orchestrates limit guard, parser, date resolver and ledger.
pub struct ExpensePipeline {
    ledger: Arc<dyn LedgerStore>,
    clock: Clock,
}

impl ExpensePipeline {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used when past mode is off.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Entry point for a new message.
    ///
    /// A limit violation leaves the session untouched. Otherwise any staged
    /// confirmation is superseded by this message.
    #[instrument(skip(self, session, raw_text), fields(owner_id = owner_id))]
    pub async fn ingest(
        &self,
        session: &mut SessionState,
        owner_id: i64,
        raw_text: Option<&str>,
    ) -> Result<IngestOutcome, PipelineError> {
        let text = match check_limits(raw_text) {
            Ok(Guarded::Text(text)) => text,
            Ok(Guarded::Empty) => return Ok(IngestOutcome::Ignored),
            Err(limit) => {
                warn!(limit = %limit, "Message rejected by input limits");
                return Err(rejected(limit.into()));
            }
        };

        session.pending = None;

        let parsed = parse(text);

        if parsed.entries.is_empty() {
            info!(
                invalid_count = parsed.invalid_lines.len(),
                "No valid lines in message"
            );
            return Err(rejected(PipelineError::NothingParsed {
                invalid_lines: parsed.invalid_lines,
            }));
        }

        if parsed.has_invalid() {
            info!(
                valid_count = parsed.entries.len(),
                invalid_count = parsed.invalid_lines.len(),
                "Partially parsed message staged for confirmation"
            );
            CONFIRMATIONS_STAGED_TOTAL.inc();
            let pending = PendingConfirmation {
                entries: parsed.entries,
                invalid_lines: parsed.invalid_lines,
            };
            session.pending = Some(pending.clone());
            return Ok(IngestOutcome::AwaitingConfirmation(pending));
        }

        let summary = self
            .commit(session, owner_id, parsed.entries, CommitPath::Auto)
            .await?;
        Ok(IngestOutcome::Committed(summary))
    }

    /// Save the staged entries.
    ///
    /// The staging is consumed even when the save fails; the user resubmits.
    #[instrument(skip(self, session), fields(owner_id = owner_id))]
    pub async fn confirm(
        &self,
        session: &mut SessionState,
        owner_id: i64,
    ) -> Result<CommitSummary, PipelineError> {
        let pending = session
            .pending
            .take()
            .ok_or_else(|| rejected(PipelineError::NothingToConfirm))?;

        self.commit(session, owner_id, pending.entries, CommitPath::Confirm)
            .await
    }

    /// Drop any staged entries. Returns whether something was staged.
    pub fn cancel(&self, session: &mut SessionState) -> bool {
        session.pending.take().is_some()
    }

    /// Delete the most recent batch, scoped to `owner_id`.
    ///
    /// On a storage failure the undo target is kept so the call can be retried.
    #[instrument(skip(self, session), fields(owner_id = owner_id))]
    pub async fn undo(
        &self,
        session: &mut SessionState,
        owner_id: i64,
    ) -> Result<UndoSummary, PipelineError> {
        if session.last_saved_ids.is_empty() {
            UNDO_TOTAL.with_label_values(&["nothing"]).inc();
            return Err(rejected(PipelineError::NothingToUndo));
        }

        let deleted = match self
            .ledger
            .delete_by_ids_for_owner(&session.last_saved_ids, owner_id)
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                error!(error = %e, "Undo failed");
                UNDO_TOTAL.with_label_values(&["error"]).inc();
                return Err(rejected(e.into()));
            }
        };

        let requested = std::mem::take(&mut session.last_saved_ids).len();
        UNDO_TOTAL.with_label_values(&["deleted"]).inc();

        if (deleted as usize) < requested {
            info!(
                requested = requested,
                deleted = deleted,
                "Undo removed fewer rows than targeted"
            );
        }

        Ok(UndoSummary { requested, deleted })
    }

    /// Redirect subsequent saves to `year`-`month`.
    pub fn enable_past_mode(
        &self,
        session: &mut SessionState,
        year: i32,
        month: u32,
    ) -> Result<YearMonth, PipelineError> {
        let target = YearMonth::new(year, month)
            .ok_or_else(|| rejected(PipelineError::InvalidPastMonth { year, month }))?;
        session.past_month = Some(target);
        info!(past_month = %target, "Past mode enabled");
        Ok(target)
    }

    /// Return to stamping with the current time. Yields the month that was
    /// active, if any.
    pub fn disable_past_mode(&self, session: &mut SessionState) -> Option<YearMonth> {
        let previous = session.past_month.take();
        if let Some(month) = previous {
            info!(past_month = %month, "Past mode disabled");
        }
        previous
    }

    async fn commit(
        &self,
        session: &mut SessionState,
        owner_id: i64,
        entries: Vec<Entry>,
        path: CommitPath,
    ) -> Result<CommitSummary, PipelineError> {
        let recorded_at = resolve_timestamp(session.past_month, (self.clock)());

        let ids = match self
            .ledger
            .insert_batch(owner_id, &entries, recorded_at)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, entry_count = entries.len(), "Batch not saved");
                return Err(rejected(e.into()));
            }
        };

        session.last_saved_ids = ids.clone();

        BATCHES_COMMITTED_TOTAL
            .with_label_values(&[path.as_str()])
            .inc();
        ENTRIES_COMMITTED_TOTAL.inc_by(entries.len() as u64);

        info!(
            entry_count = entries.len(),
            path = path.as_str(),
            past_mode = session.past_month.is_some(),
            "Entries committed"
        );

        Ok(CommitSummary {
            ids,
            entries,
            recorded_at,
            past_month: session.past_month,
        })
    }
}
