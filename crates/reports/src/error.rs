use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid period: {from} is after {to}")]
    InvalidPeriod { from: NaiveDate, to: NaiveDate },

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv export failed: {0}")]
    Io(#[from] std::io::Error),
}
