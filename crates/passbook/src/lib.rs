//! Passbook module (event-sourced).
//!
//! Each member has one passbook stream recording deposits, interest and fine
//! payments, and withdrawals.

pub mod passbook;

pub use passbook::{
    EntryKind, EntryRecorded, EntryReversed, Passbook, PassbookCommand, PassbookEvent,
    PassbookLine, RecordEntry, ReverseEntry, passbook_stream_id, PASSBOOK_AGGREGATE_TYPE,
};
