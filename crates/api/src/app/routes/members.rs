use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use sahakari_core::{AggregateId, TenantId};
use sahakari_members::{
    DeactivateMember, Member, MemberCommand, MemberId, ReactivateMember, RegisterMember, UpdateMember,
    MEMBER_AGGREGATE_TYPE,
};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_member).get(list_members))
        .route("/:id", get(get_member).patch(update_member))
        .route("/:id/deactivate", post(deactivate_member))
        .route("/:id/reactivate", post(reactivate_member))
}

fn dispatch_member(
    services: &AppServices,
    tenant_id: TenantId,
    agg: AggregateId,
    cmd: MemberCommand,
    status: StatusCode,
) -> Response {
    match services.dispatch::<Member>(tenant_id, agg, MEMBER_AGGREGATE_TYPE, cmd, |_, id| {
        Member::empty(MemberId::new(id))
    }) {
        Ok(committed) => common::accepted(status, agg, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn register_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterMemberRequest>,
) -> Response {
    let agg = AggregateId::new();
    let cmd = MemberCommand::Register(RegisterMember {
        tenant_id: tenant.tenant_id(),
        member_id: MemberId::new(agg),
        membership_no: body.membership_no,
        name: body.name,
        phone: body.phone,
        joined_on: body.joined_on.unwrap_or_else(common::today),
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "members.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }

    // Membership numbers are unique within a society. Best-effort: the check
    // reads the member directory, so two registrations racing with the same
    // number can both pass before either is projected.
    if let MemberCommand::Register(reg) = &cmd {
        let views = match services.views(tenant.tenant_id()) {
            Ok(v) => v,
            Err(e) => return errors::rebuild_error_to_response(e),
        };
        let wanted = reg.membership_no.trim();
        let taken = views
            .members
            .list(tenant.tenant_id())
            .iter()
            .any(|m| m.membership_no.trim() == wanted);
        if taken {
            return errors::json_error(
                StatusCode::CONFLICT,
                "conflict",
                format!("membership number '{wanted}' is already in use"),
            );
        }
    }

    dispatch_member(&services, tenant.tenant_id(), agg, cmd, StatusCode::CREATED)
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "members.read") {
        return resp;
    }
    match services.views(tenant.tenant_id()) {
        Ok(views) => Json(views.members.list(tenant.tenant_id())).into_response(),
        Err(e) => errors::rebuild_error_to_response(e),
    }
}

pub async fn get_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "members.read") {
        return resp;
    }
    let agg = match common::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let views = match services.views(tenant.tenant_id()) {
        Ok(v) => v,
        Err(e) => return errors::rebuild_error_to_response(e),
    };
    match views.members.get(tenant.tenant_id(), &MemberId::new(agg)) {
        Some(m) => Json(m).into_response(),
        None => errors::not_found("member"),
    }
}

pub async fn update_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateMemberRequest>,
) -> Response {
    let agg = match common::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = MemberCommand::Update(UpdateMember {
        tenant_id: tenant.tenant_id(),
        member_id: MemberId::new(agg),
        name: body.name,
        phone: body.phone,
        occurred_at: Utc::now(),
    });
    lifecycle(&services, &tenant, &principal, agg, cmd)
}

pub async fn deactivate_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> Response {
    let agg = match common::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = body.map(|Json(b)| b).unwrap_or_default().reason;
    let cmd = MemberCommand::Deactivate(DeactivateMember {
        tenant_id: tenant.tenant_id(),
        member_id: MemberId::new(agg),
        reason,
        occurred_at: Utc::now(),
    });
    lifecycle(&services, &tenant, &principal, agg, cmd)
}

pub async fn reactivate_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let agg = match common::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = MemberCommand::Reactivate(ReactivateMember {
        tenant_id: tenant.tenant_id(),
        member_id: MemberId::new(agg),
        occurred_at: Utc::now(),
    });
    lifecycle(&services, &tenant, &principal, agg, cmd)
}

fn lifecycle(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    agg: AggregateId,
    cmd: MemberCommand,
) -> Response {
    let cmd = match CmdAuth::new(cmd, "members.write").check(tenant, principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(services, tenant.tenant_id()) {
        return resp;
    }
    dispatch_member(services, tenant.tenant_id(), agg, cmd, StatusCode::OK)
}
