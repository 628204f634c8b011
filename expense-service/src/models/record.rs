//! Persisted ledger rows and read-side aggregates.

use crate::models::Entry;
use crate::services::parser::parse_line;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One saved expense line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    pub owner_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Re-parse the stored `"label amount"` text. Rows written by other
    /// tools may not follow the grammar, in which case this is `None`.
    pub fn parsed(&self) -> Option<Entry> {
        parse_line(&self.text)
    }
}

/// Record as exposed to report consumers, with the parsed entry inlined.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub id: i64,
    pub text: String,
    pub label: Option<String>,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerRecord> for RecordView {
    fn from(record: LedgerRecord) -> Self {
        let parsed = record.parsed();
        Self {
            id: record.id,
            label: parsed.as_ref().map(|e| e.label.clone()),
            amount: parsed.map(|e| e.amount),
            text: record.text,
            created_at: record.created_at,
        }
    }
}

/// Totals for one owner across all of their records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    pub owner_id: i64,
    /// All rows, including ones whose text no longer parses.
    pub count: i64,
    /// Sum over rows that parse; unparsable rows add nothing.
    pub total: Decimal,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

impl OwnerSummary {
    pub fn from_records<'a>(
        owner_id: i64,
        records: impl IntoIterator<Item = &'a LedgerRecord>,
    ) -> Self {
        let mut summary = Self {
            owner_id,
            count: 0,
            total: Decimal::ZERO,
            first_at: None,
            last_at: None,
        };

        for record in records {
            summary.count += 1;
            if let Some(entry) = record.parsed() {
                summary.total += entry.amount;
            }
            summary.first_at = Some(match summary.first_at {
                Some(first) => first.min(record.created_at),
                None => record.created_at,
            });
            summary.last_at = Some(match summary.last_at {
                Some(last) => last.max(record.created_at),
                None => record.created_at,
            });
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn record(id: i64, text: &str, day: u32) -> LedgerRecord {
        LedgerRecord {
            id,
            owner_id: 123,
            text: text.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, day, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn summary_sums_parsable_rows_and_counts_all() {
        let rows = vec![
            record(1, "Milk 100", 1),
            record(2, "Bread 50.50", 15),
            record(3, "Cheese 200,25", 31),
            record(4, "not an expense", 20),
        ];

        let summary = OwnerSummary::from_records(123, &rows);

        assert_eq!(summary.count, 4);
        assert_eq!(summary.total, Decimal::from_str("350.75").unwrap());
        assert_eq!(summary.first_at, Some(rows[0].created_at));
        assert_eq!(summary.last_at, Some(rows[2].created_at));
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = OwnerSummary::from_records(7, &Vec::<LedgerRecord>::new());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.total, Decimal::ZERO);
        assert!(summary.first_at.is_none());
    }

    #[test]
    fn view_exposes_parsed_parts() {
        let view = RecordView::from(record(9, "White bread 50.50", 2));
        assert_eq!(view.label.as_deref(), Some("White bread"));
        assert_eq!(view.amount, Some(Decimal::from_str("50.50").unwrap()));

        let broken = RecordView::from(record(10, "Bread abc", 2));
        assert!(broken.label.is_none());
        assert!(broken.amount.is_none());
    }
}
