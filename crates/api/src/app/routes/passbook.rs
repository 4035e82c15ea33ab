use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use sahakari_members::MemberId;
use sahakari_passbook::{
    passbook_stream_id, Passbook, PassbookCommand, RecordEntry, ReverseEntry, PASSBOOK_AGGREGATE_TYPE,
};
use sahakari_reports::running_balance;

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_passbook))
        .route("/entries", post(record_entry))
        .route("/entries/:entry_id/reverse", post(reverse_entry))
}

fn dispatch_passbook(
    services: &AppServices,
    tenant: &TenantContext,
    member_id: MemberId,
    cmd: PassbookCommand,
    entry_id: Uuid,
    status: StatusCode,
) -> Response {
    match services.dispatch::<Passbook>(
        tenant.tenant_id(),
        passbook_stream_id(member_id),
        PASSBOOK_AGGREGATE_TYPE,
        cmd,
        |_, _| Passbook::empty(member_id),
    ) {
        Ok(committed) => common::accepted(status, entry_id, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Statement with running savings balance, plus every line including
/// reversed ones.
pub async fn get_passbook(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(member_id): Path<String>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "passbook.read") {
        return resp;
    }
    let member_id = match common::parse_id(&member_id, "member") {
        Ok(v) => MemberId::new(v),
        Err(resp) => return resp,
    };
    let views = match services.views(tenant.tenant_id()) {
        Ok(v) => v,
        Err(e) => return errors::rebuild_error_to_response(e),
    };
    let Some(member) = views.members.get(tenant.tenant_id(), &member_id) else {
        return errors::not_found("member");
    };

    let records = views.ledger.records(tenant.tenant_id());
    let statement = running_balance(&records, member_id);
    let lines = views
        .passbooks
        .get(tenant.tenant_id(), &member_id)
        .map(|p| p.entries)
        .unwrap_or_default();

    Json(json!({
        "member": member,
        "statement": statement,
        "lines": lines,
    }))
    .into_response()
}

pub async fn record_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(member_id): Path<String>,
    Json(body): Json<dto::RecordEntryRequest>,
) -> Response {
    let member_id = match common::parse_id(&member_id, "member") {
        Ok(v) => MemberId::new(v),
        Err(resp) => return resp,
    };
    let entry_id = Uuid::now_v7();
    let cmd = PassbookCommand::RecordEntry(RecordEntry {
        tenant_id: tenant.tenant_id(),
        member_id,
        entry_id,
        kind: body.kind,
        amount: body.amount,
        mode: body.mode,
        entry_date: body.entry_date.unwrap_or_else(common::today),
        note: body.note,
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "passbook.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }
    if let Err(resp) = common::require_active_member(&services, tenant.tenant_id(), member_id) {
        return resp;
    }

    dispatch_passbook(&services, &tenant, member_id, cmd, entry_id, StatusCode::CREATED)
}

pub async fn reverse_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((member_id, entry_id)): Path<(String, String)>,
    body: Option<Json<dto::ReasonRequest>>,
) -> Response {
    let member_id = match common::parse_id(&member_id, "member") {
        Ok(v) => MemberId::new(v),
        Err(resp) => return resp,
    };
    let entry_id: Uuid = match entry_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("entry"),
    };
    let cmd = PassbookCommand::ReverseEntry(ReverseEntry {
        tenant_id: tenant.tenant_id(),
        member_id,
        entry_id,
        reason: body.map(|Json(b)| b).unwrap_or_default().reason,
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "passbook.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }
    if let Err(resp) = common::load_member(&services, tenant.tenant_id(), member_id) {
        return resp;
    }

    dispatch_passbook(&services, &tenant, member_id, cmd, entry_id, StatusCode::OK)
}
