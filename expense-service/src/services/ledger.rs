//! Storage seam for ledger records.

use crate::error::LedgerError;
use crate::models::{Entry, LedgerRecord, OwnerSummary, YearMonth};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Upper bound for `recent_records`.
pub const MAX_RECENT_RECORDS: i64 = 100;

/// Persistence for ledger records.
///
/// Writes are all-or-nothing. Deletes are always scoped by owner in the
/// same statement that removes the rows.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn health_check(&self) -> Result<(), LedgerError>;

    /// Insert every entry with the same timestamp. Returns the new ids in
    /// entry order. Nothing is written if any row fails.
    async fn insert_batch(
        &self,
        owner_id: i64,
        entries: &[Entry],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<i64>, LedgerError>;

    /// Delete the rows in `ids` that belong to `owner_id`. Returns how many
    /// rows were actually removed.
    async fn delete_by_ids_for_owner(&self, ids: &[i64], owner_id: i64)
        -> Result<u64, LedgerError>;

    /// Records created within `month` (UTC), oldest first.
    async fn records_for_month(
        &self,
        owner_id: i64,
        month: YearMonth,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;

    /// Every owner with at least one record, ascending.
    async fn distinct_owners(&self) -> Result<Vec<i64>, LedgerError>;

    /// Months that contain records for `owner_id`, newest first.
    async fn available_months(&self, owner_id: i64) -> Result<Vec<YearMonth>, LedgerError>;

    /// Most recent records, newest first.
    async fn recent_records(
        &self,
        owner_id: i64,
        limit: i64,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;

    async fn owner_summary(&self, owner_id: i64) -> Result<OwnerSummary, LedgerError>;
}

pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_RECENT_RECORDS)
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<LedgerRecord>,
    next_id: i64,
    fail_on_row: Option<usize>,
    fail_next_delete: bool,
}

/// Process-local ledger with the same contract as the Postgres store.
///
/// Used by tests and local runs. `fail_on_row` simulates a storage failure
/// partway through a batch; `fail_next_delete` does the same for a delete.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<MemoryState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `insert_batch` fail when it reaches row `index`
    /// (zero based). The failure fires once.
    pub fn fail_on_row(&self, index: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_on_row = Some(index);
        }
    }

    /// Make the next `delete_by_ids_for_owner` fail without removing rows.
    /// The failure fires once.
    pub fn fail_next_delete(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_delete = true;
        }
    }

    /// Snapshot of every stored row.
    pub fn rows(&self) -> Vec<LedgerRecord> {
        self.state
            .lock()
            .map(|state| state.rows.clone())
            .unwrap_or_default()
    }

    pub fn count_for_owner(&self, owner_id: i64) -> usize {
        self.rows()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .count()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, LedgerError> {
        self.state
            .lock()
            .map_err(|e| LedgerError::Database(format!("in-memory ledger poisoned: {}", e)))
    }

    fn owner_rows(&self, owner_id: i64) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self
            .lock()?
            .rows
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn health_check(&self) -> Result<(), LedgerError> {
        self.lock().map(|_| ())
    }

    async fn insert_batch(
        &self,
        owner_id: i64,
        entries: &[Entry],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<i64>, LedgerError> {
        let mut state = self.lock()?;

        if owner_id <= 0 {
            return Err(LedgerError::Constraint(format!(
                "owner_id must be positive, got {}",
                owner_id
            )));
        }

        // Stage the whole batch before touching the table.
        let mut staged = Vec::with_capacity(entries.len());
        let mut next_id = state.next_id;
        for (index, entry) in entries.iter().enumerate() {
            if state.fail_on_row == Some(index) {
                state.fail_on_row = None;
                return Err(LedgerError::Database(format!(
                    "simulated failure on row {}",
                    index
                )));
            }
            next_id += 1;
            staged.push(LedgerRecord {
                id: next_id,
                owner_id,
                text: entry.render(),
                created_at: recorded_at,
            });
        }

        let ids = staged.iter().map(|r| r.id).collect();
        state.next_id = next_id;
        state.rows.extend(staged);
        Ok(ids)
    }

    async fn delete_by_ids_for_owner(
        &self,
        ids: &[i64],
        owner_id: i64,
    ) -> Result<u64, LedgerError> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_delete) {
            return Err(LedgerError::Database("simulated delete failure".to_string()));
        }
        let before = state.rows.len();
        state
            .rows
            .retain(|r| !(r.owner_id == owner_id && ids.contains(&r.id)));
        Ok((before - state.rows.len()) as u64)
    }

    async fn records_for_month(
        &self,
        owner_id: i64,
        month: YearMonth,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let (start, end) = month.range();
        let mut rows: Vec<LedgerRecord> = self
            .owner_rows(owner_id)?
            .into_iter()
            .filter(|r| r.created_at >= start && r.created_at < end)
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }

    async fn distinct_owners(&self) -> Result<Vec<i64>, LedgerError> {
        let mut owners: Vec<i64> = self.lock()?.rows.iter().map(|r| r.owner_id).collect();
        owners.sort_unstable();
        owners.dedup();
        Ok(owners)
    }

    async fn available_months(&self, owner_id: i64) -> Result<Vec<YearMonth>, LedgerError> {
        let mut months: Vec<YearMonth> = self
            .owner_rows(owner_id)?
            .iter()
            .map(|r| YearMonth::of(r.created_at))
            .collect();
        months.sort_unstable_by(|a, b| b.cmp(a));
        months.dedup();
        Ok(months)
    }

    async fn recent_records(
        &self,
        owner_id: i64,
        limit: i64,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut rows = self.owner_rows(owner_id)?;
        rows.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        rows.truncate(clamp_limit(limit) as usize);
        Ok(rows)
    }

    async fn owner_summary(&self, owner_id: i64) -> Result<OwnerSummary, LedgerError> {
        let rows = self.owner_rows(owner_id)?;
        Ok(OwnerSummary::from_records(owner_id, &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn entries(labels: &[&str]) -> Vec<Entry> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| Entry::new(*l, Decimal::from(i as i64 + 1)))
            .collect()
    }

    #[tokio::test]
    async fn insert_returns_ids_in_entry_order() {
        let ledger = InMemoryLedger::new();
        let ids = ledger
            .insert_batch(1, &entries(&["a", "b", "c"]), Utc::now())
            .await
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let texts: Vec<String> = ledger.rows().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["a 1", "b 2", "c 3"]);
    }

    #[tokio::test]
    async fn non_positive_owner_is_rejected() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .insert_batch(0, &entries(&["a"]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Constraint(_)));
        assert!(ledger.rows().is_empty());
    }

    #[tokio::test]
    async fn failure_partway_leaves_no_rows() {
        let ledger = InMemoryLedger::new();
        ledger
            .insert_batch(5, &entries(&["kept"]), Utc::now())
            .await
            .unwrap();

        ledger.fail_on_row(2);
        let result = ledger
            .insert_batch(5, &entries(&["a", "b", "c", "d"]), Utc::now())
            .await;

        assert!(result.is_err());
        assert_eq!(ledger.count_for_owner(5), 1);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let ledger = InMemoryLedger::new();
        let ids_a = ledger
            .insert_batch(1, &entries(&["a", "b"]), Utc::now())
            .await
            .unwrap();
        ledger
            .insert_batch(2, &entries(&["c"]), Utc::now())
            .await
            .unwrap();

        assert_eq!(ledger.delete_by_ids_for_owner(&ids_a, 2).await.unwrap(), 0);
        assert_eq!(ledger.count_for_owner(1), 2);

        assert_eq!(ledger.delete_by_ids_for_owner(&ids_a, 1).await.unwrap(), 2);
        assert_eq!(ledger.count_for_owner(1), 0);
        assert_eq!(ledger.count_for_owner(2), 1);
    }

    #[tokio::test]
    async fn months_and_owners_are_listed() {
        let ledger = InMemoryLedger::new();
        let nov = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let jan = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap();
        ledger.insert_batch(9, &entries(&["a"]), jan).await.unwrap();
        ledger.insert_batch(9, &entries(&["b"]), nov).await.unwrap();
        ledger.insert_batch(3, &entries(&["c"]), jan).await.unwrap();

        assert_eq!(ledger.distinct_owners().await.unwrap(), vec![3, 9]);
        assert_eq!(
            ledger.available_months(9).await.unwrap(),
            vec![YearMonth::new(2026, 1).unwrap(), YearMonth::new(2025, 11).unwrap()]
        );

        let january = ledger
            .records_for_month(9, YearMonth::new(2026, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].text, "a 1");
    }

    #[tokio::test]
    async fn delete_failure_fires_once_and_keeps_rows() {
        let ledger = InMemoryLedger::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let ids = ledger.insert_batch(5, &entries(&["a", "b"]), at).await.unwrap();

        ledger.fail_next_delete();
        assert!(ledger.delete_by_ids_for_owner(&ids, 5).await.is_err());
        assert_eq!(ledger.count_for_owner(5), 2);

        assert_eq!(ledger.delete_by_ids_for_owner(&ids, 5).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recent_records_are_newest_first_and_clamped() {
        let ledger = InMemoryLedger::new();
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        ledger.insert_batch(4, &entries(&["old"]), older).await.unwrap();
        ledger.insert_batch(4, &entries(&["new"]), newer).await.unwrap();

        let recent = ledger.recent_records(4, 0).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].text, "new 1");
    }
}
