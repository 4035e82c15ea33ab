use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use chrono::{NaiveDate, Utc};

use sahakari_auth::{CommandAuthorization, Permission};
use sahakari_core::{AggregateId, TenantId};
use sahakari_infra::event_store::StoredEvent;
use sahakari_members::{Member, MemberId, MemberStatus};

use crate::app::dto::CommandAccepted;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

/// A command paired with the permissions it needs.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, permission: &'static str) -> Self {
        Self {
            inner,
            required: vec![Permission::new(permission)],
        }
    }

    /// Authorize in the request context and hand back the bare command.
    pub fn check(self, tenant: &TenantContext, principal: &PrincipalContext) -> Result<C, Response> {
        authz::authorize_command(tenant, principal, &self).map_err(errors::authz_error_to_response)?;
        Ok(self.inner)
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

pub fn require_read(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), Response> {
    authz::authorize_read(tenant, principal, permission).map_err(errors::authz_error_to_response)
}

/// Ledger writes are refused with 402 while the subscription gate is on and
/// the society is neither Active nor in Grace.
pub fn ensure_writable(services: &AppServices, tenant_id: TenantId) -> Result<(), Response> {
    if !services.enforces_subscription() {
        return Ok(());
    }
    let status = services
        .subscription_status(tenant_id)
        .map_err(errors::dispatch_error_to_response)?;
    if status.allows_writes() {
        Ok(())
    } else {
        Err(errors::subscription_inactive(status))
    }
}

/// The member as its own stream records it; 404 when never registered.
pub fn load_member(services: &AppServices, tenant_id: TenantId, member_id: MemberId) -> Result<Member, Response> {
    let member = services
        .load(tenant_id, member_id.0, |_, id| Member::empty(MemberId::new(id)))
        .map_err(errors::dispatch_error_to_response)?;
    if !member.is_registered() {
        return Err(errors::not_found("member"));
    }
    Ok(member)
}

/// New passbook lines and loans are only booked for active members.
pub fn require_active_member(services: &AppServices, tenant_id: TenantId, member_id: MemberId) -> Result<(), Response> {
    let member = load_member(services, tenant_id, member_id)?;
    if member.status() != MemberStatus::Active {
        return Err(errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "member is inactive",
        ));
    }
    Ok(())
}

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, Response> {
    raw.parse().map_err(|_| errors::invalid_id(what))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn accepted(status: StatusCode, id: impl ToString, committed: &[StoredEvent]) -> Response {
    (
        status,
        Json(CommandAccepted {
            id: id.to_string(),
            events_committed: committed.len(),
        }),
    )
        .into_response()
}
