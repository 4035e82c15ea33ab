//! Process-wide tracing setup shared by the binaries.

pub mod logging;

pub use logging::{init, LogFormat, ParseLogFormatError};
