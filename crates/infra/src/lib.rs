//! Infrastructure layer: event store backends, the command pipeline and the
//! read models fed from published events.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use projections::{ProjectionError, ProjectionHub, RebuildError, RebuildReport};
