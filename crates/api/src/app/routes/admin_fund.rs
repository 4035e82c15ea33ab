use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use sahakari_treasury::{
    AdminFund, AdminFundCommand, FundMovement, TransferFunds, ADMIN_FUND_AGGREGATE_TYPE, ADMIN_FUND_ID,
};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_admin_fund))
        .route("/injections", post(inject_funds))
        .route("/withdrawals", post(withdraw_funds))
        .route("/transfers", post(transfer_funds))
}

fn dispatch_fund(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    cmd: AdminFundCommand,
    movement_id: Uuid,
) -> Response {
    let cmd = match CmdAuth::new(cmd, "admin_fund.write").check(tenant, principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(services, tenant.tenant_id()) {
        return resp;
    }
    match services.dispatch::<AdminFund>(
        tenant.tenant_id(),
        ADMIN_FUND_ID,
        ADMIN_FUND_AGGREGATE_TYPE,
        cmd,
        |_, id| AdminFund::empty(id),
    ) {
        Ok(committed) => common::accepted(StatusCode::CREATED, movement_id, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn movement(tenant: &TenantContext, movement_id: Uuid, body: dto::FundMovementRequest) -> FundMovement {
    FundMovement {
        tenant_id: tenant.tenant_id(),
        movement_id,
        amount: body.amount,
        mode: body.mode,
        on: body.on.unwrap_or_else(common::today),
        note: body.note,
        occurred_at: Utc::now(),
    }
}

pub async fn get_admin_fund(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "admin_fund.read") {
        return resp;
    }
    match services.load(tenant.tenant_id(), ADMIN_FUND_ID, |_, id| AdminFund::empty(id)) {
        Ok(fund) => Json(dto::AdminFundView::from(&fund)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn inject_funds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::FundMovementRequest>,
) -> Response {
    let movement_id = Uuid::now_v7();
    let cmd = AdminFundCommand::Inject(movement(&tenant, movement_id, body));
    dispatch_fund(&services, &tenant, &principal, cmd, movement_id)
}

pub async fn withdraw_funds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::FundMovementRequest>,
) -> Response {
    let movement_id = Uuid::now_v7();
    let cmd = AdminFundCommand::Withdraw(movement(&tenant, movement_id, body));
    dispatch_fund(&services, &tenant, &principal, cmd, movement_id)
}

pub async fn transfer_funds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TransferRequest>,
) -> Response {
    let movement_id = Uuid::now_v7();
    let cmd = AdminFundCommand::Transfer(TransferFunds {
        tenant_id: tenant.tenant_id(),
        movement_id,
        amount: body.amount,
        from: body.from,
        to: body.to,
        on: body.on.unwrap_or_else(common::today),
        note: body.note,
        occurred_at: Utc::now(),
    });
    dispatch_fund(&services, &tenant, &principal, cmd, movement_id)
}
