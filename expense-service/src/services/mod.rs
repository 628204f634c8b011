//! Services module for expense-service.

pub mod access;
pub mod database;
pub mod dates;
pub mod ledger;
pub mod limits;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod sessions;

pub use access::AccessGate;
pub use database::Database;
pub use ledger::{InMemoryLedger, LedgerStore};
pub use metrics::{get_metrics, init_metrics};
pub use pipeline::{CommitSummary, ExpensePipeline, IngestOutcome, UndoSummary};
pub use sessions::SessionStore;
