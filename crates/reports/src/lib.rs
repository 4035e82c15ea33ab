//! Ledger reconciliation and reporting.
//!
//! Every function here is a pure fold over [`LedgerRecord`]s, so the same
//! records always produce the same figures. Producers are expected to drop
//! reversed entries before handing records over.

pub mod csv;
pub mod error;
pub mod liquidity;
pub mod loan_book;
pub mod profit;
pub mod record;
pub mod statement;
pub mod summary;

pub use error::ReportError;
pub use liquidity::{liquidity_snapshot, LiquiditySnapshot};
pub use loan_book::{loan_book, LoanBook, LoanBookTotals, LoanPosition};
pub use profit::{profit_and_loss, Period, ProfitAndLoss};
pub use record::{FundDirection, LedgerDetail, LedgerRecord};
pub use statement::{running_balance, PassbookStatement, StatementRow};
pub use summary::{society_summary, SocietySummary};
