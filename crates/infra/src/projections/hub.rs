//! One entry point that feeds every read model.
//!
//! A tenant is *warm* once its views were rebuilt from the store in this
//! process. Published envelopes for a cold tenant trigger that rebuild
//! instead of being applied on their own, so a restarted process never
//! serves a view that starts halfway through a stream. The same replay
//! runs when a published envelope arrives ahead of an earlier one on its
//! stream.

use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use sahakari_core::{AggregateId, TenantId};
use sahakari_events::EventEnvelope;
use sahakari_loans::LoanId;
use sahakari_members::MemberId;

use super::loans::{LoanBookProjection, LoanReadModel};
use super::members::{MemberDirectoryProjection, MemberReadModel};
use super::passbook::{PassbookProjection, PassbookReadModel};
use super::society_ledger::SocietyLedgerProjection;
use super::subscription::{SubscriptionProjection, SubscriptionReadModel};
use super::ProjectionError;
use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::InMemoryTenantStore;

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Store(#[from] EventStoreError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub tenant_id: TenantId,
    pub events_replayed: usize,
    pub streams: usize,
}

#[derive(Debug)]
pub struct ProjectionHub {
    pub members: MemberDirectoryProjection<InMemoryTenantStore<MemberId, MemberReadModel>>,
    pub passbooks: PassbookProjection<InMemoryTenantStore<MemberId, PassbookReadModel>>,
    pub loans: LoanBookProjection<InMemoryTenantStore<LoanId, LoanReadModel>>,
    pub ledger: SocietyLedgerProjection,
    pub subscription: SubscriptionProjection<InMemoryTenantStore<AggregateId, SubscriptionReadModel>>,
    warm: RwLock<HashSet<TenantId>>,
    apply_lock: Mutex<()>,
}

impl Default for ProjectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionHub {
    pub fn new() -> Self {
        Self {
            members: MemberDirectoryProjection::new(InMemoryTenantStore::new()),
            passbooks: PassbookProjection::new(InMemoryTenantStore::new()),
            loans: LoanBookProjection::new(InMemoryTenantStore::new()),
            ledger: SocietyLedgerProjection::new(),
            subscription: SubscriptionProjection::new(InMemoryTenantStore::new()),
            warm: RwLock::new(HashSet::new()),
            apply_lock: Mutex::new(()),
        }
    }

    pub fn is_warm(&self, tenant_id: TenantId) -> bool {
        self.warm.read().map(|w| w.contains(&tenant_id)).unwrap_or(false)
    }

    /// Route one envelope to every projection.
    ///
    /// All projections see the envelope even if one of them fails; the first
    /// failure is returned.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let _guard = self.apply_lock.lock().map_err(|_| ProjectionError::Poisoned)?;
        self.apply_unlocked(envelope)
    }

    fn apply_unlocked(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let results = [
            self.members.apply_envelope(envelope),
            self.passbooks.apply_envelope(envelope),
            self.loans.apply_envelope(envelope),
            self.ledger.apply_envelope(envelope),
            self.subscription.apply_envelope(envelope),
        ];
        results.into_iter().collect()
    }

    /// Apply a freshly published envelope, warming its tenant first if needed.
    ///
    /// The store already holds the envelope's event, so a warm-up replays it
    /// and the envelope itself is then skipped as a duplicate. A sequence gap
    /// means an earlier envelope is still in flight; the tenant is replayed
    /// from the store and the late envelope is skipped when it arrives.
    pub fn apply_published<S: EventStore>(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        store: &S,
    ) -> Result<(), RebuildError> {
        let _guard = self.apply_lock.lock().map_err(|_| ProjectionError::Poisoned)?;
        if !self.is_warm(envelope.tenant_id()) {
            self.rebuild_unlocked(envelope.tenant_id(), store)?;
        }
        match self.apply_unlocked(envelope) {
            Ok(()) => Ok(()),
            Err(ProjectionError::NonMonotonicSequence { last, found }) => {
                warn!(
                    tenant_id = %envelope.tenant_id(),
                    aggregate_id = %envelope.aggregate_id(),
                    last,
                    found,
                    "sequence gap, replaying tenant"
                );
                self.rebuild_unlocked(envelope.tenant_id(), store)?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Make sure a tenant's views reflect the store before a query.
    pub fn ensure_warm<S: EventStore>(&self, tenant_id: TenantId, store: &S) -> Result<(), RebuildError> {
        if self.is_warm(tenant_id) {
            return Ok(());
        }
        let _guard = self.apply_lock.lock().map_err(|_| ProjectionError::Poisoned)?;
        if !self.is_warm(tenant_id) {
            self.rebuild_unlocked(tenant_id, store)?;
        }
        Ok(())
    }

    /// Drop every view of one tenant and replay its full history.
    ///
    /// Other tenants are untouched.
    #[instrument(skip(self, store), fields(tenant_id = %tenant_id), err)]
    pub fn rebuild_tenant<S: EventStore>(&self, tenant_id: TenantId, store: &S) -> Result<RebuildReport, RebuildError> {
        let _guard = self.apply_lock.lock().map_err(|_| ProjectionError::Poisoned)?;
        self.rebuild_unlocked(tenant_id, store)
    }

    fn rebuild_unlocked<S: EventStore>(&self, tenant_id: TenantId, store: &S) -> Result<RebuildReport, RebuildError> {
        let history = store.load_tenant(tenant_id)?;
        if history.iter().any(|e| e.tenant_id != tenant_id) {
            return Err(EventStoreError::TenantIsolation("load_tenant returned another tenant's event".to_string()).into());
        }

        if let Ok(mut warm) = self.warm.write() {
            warm.remove(&tenant_id);
        }

        let envelopes: Vec<_> = history.iter().map(|e| e.to_envelope()).collect();
        self.members.rebuild_from_scratch(tenant_id, envelopes.iter().cloned())?;
        self.passbooks.rebuild_from_scratch(tenant_id, envelopes.iter().cloned())?;
        self.loans.rebuild_from_scratch(tenant_id, envelopes.iter().cloned())?;
        self.ledger.rebuild_from_scratch(tenant_id, envelopes.iter().cloned())?;
        self.subscription.rebuild_from_scratch(tenant_id, envelopes)?;
        debug!(events = history.len(), "tenant history replayed");

        if let Ok(mut warm) = self.warm.write() {
            warm.insert(tenant_id);
        }

        let streams: HashSet<_> = history.iter().map(|e| e.aggregate_id).collect();
        let report = RebuildReport {
            tenant_id,
            events_replayed: history.len(),
            streams: streams.len(),
        };
        info!(events = report.events_replayed, streams = report.streams, "projections rebuilt");
        Ok(report)
    }
}
