//! Shared domain primitives for the society ledger: identifiers, money,
//! payment modes, the aggregate contract and the domain error type.
//!
//! Nothing here touches storage or transport.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
pub use money::{basis_points, Money, PaymentMode};
