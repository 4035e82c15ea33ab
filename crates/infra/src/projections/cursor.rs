//! Per-stream sequence cursors shared by every projection.
//!
//! Delivery is at-least-once, so a projection sees duplicates and replays.
//! The cursor remembers the last applied sequence number per
//! `(tenant, aggregate)` stream:
//! - `seq <= last` is a duplicate and is skipped
//! - `seq == last + 1` is applied
//! - anything else is a gap and is rejected

use std::collections::HashMap;
use std::sync::RwLock;

use sahakari_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` if `seq` is the next event of the stream, then advance.
    ///
    /// The write lock is held across `apply`, which serializes updates to the
    /// projection. Returns `Ok(false)` for duplicates.
    pub fn advance_with(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<bool, ProjectionError> {
        let mut cursors = self.inner.write().map_err(|_| ProjectionError::Poisoned)?;
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 || seq > last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(true)
    }

    pub fn position(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&CursorKey { tenant_id, aggregate_id }).copied())
            .unwrap_or(0)
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
    }
}
