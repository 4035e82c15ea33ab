//! Read models built from published envelopes.
//!
//! Every projection here is:
//! - **Rebuildable**: a tenant's view can be dropped and replayed from the store
//! - **Tenant-isolated**: rows are keyed by tenant and envelopes are checked
//!   against their payload's tenant
//! - **Idempotent**: duplicates are skipped by per-stream cursors

pub mod cursor;
pub mod hub;
pub mod loans;
pub mod members;
pub mod passbook;
pub mod society_ledger;
pub mod subscription;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use sahakari_core::TenantId;
use sahakari_events::EventEnvelope;

pub use cursor::StreamCursors;
pub use hub::{ProjectionHub, RebuildError, RebuildReport};
pub use loans::{LoanBookProjection, LoanReadModel, RepaymentRow};
pub use members::{MemberDirectoryProjection, MemberReadModel};
pub use passbook::{PassbookEntryRow, PassbookProjection, PassbookReadModel};
pub use society_ledger::SocietyLedgerProjection;
pub use subscription::{SubscriptionPayment, SubscriptionProjection, SubscriptionReadModel};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("read model lock poisoned")]
    Poisoned,
}

impl ProjectionError {
    pub(crate) fn tenant_mismatch() -> Self {
        ProjectionError::TenantIsolation("event tenant_id does not match envelope tenant_id".to_string())
    }
}

/// Decode an envelope payload into a typed domain event.
pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize(e.to_string()))
}

/// One tenant's envelopes in deterministic replay order (aggregate, then
/// sequence). Envelopes of other tenants are dropped.
pub(crate) fn replay_order(
    tenant_id: TenantId,
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> Vec<EventEnvelope<JsonValue>> {
    let mut envs: Vec<_> = envelopes.into_iter().filter(|e| e.tenant_id() == tenant_id).collect();
    envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));
    envs
}
