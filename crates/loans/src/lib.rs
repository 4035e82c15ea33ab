//! Loans module (event-sourced).

pub mod loan;

pub use loan::{
    monthly_interest, CloseLoan, IssueLoan, Loan, LoanClosed, LoanCommand, LoanEvent, LoanId,
    LoanIssued, LoanStatus, RecordRepayment, RepaymentRecorded, LOAN_AGGREGATE_TYPE,
    MAX_ANNUAL_RATE_BP, MAX_TENURE_MONTHS,
};
