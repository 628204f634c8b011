//! Domain models for expense-service.

mod entry;
mod month;
mod record;
mod reply;
mod session;

pub use entry::{Entry, InvalidLine, ParseResult};
pub use month::{YearMonth, PAST_MODE_HOUR};
pub use record::{LedgerRecord, OwnerSummary, RecordView};
pub use reply::Reply;
pub use session::{PendingConfirmation, SessionState};
