use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use sahakari_core::{AggregateId, TenantId};
use sahakari_loans::{
    CloseLoan, IssueLoan, Loan, LoanCommand, LoanId, RecordRepayment, LOAN_AGGREGATE_TYPE,
};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_loan).get(list_loans))
        .route("/:id", get(get_loan))
        .route("/:id/repayments", post(record_repayment))
        .route("/:id/close", post(close_loan))
}

fn dispatch_loan(
    services: &AppServices,
    tenant_id: TenantId,
    agg: AggregateId,
    cmd: LoanCommand,
    accepted_id: String,
    status: StatusCode,
) -> Response {
    match services.dispatch::<Loan>(tenant_id, agg, LOAN_AGGREGATE_TYPE, cmd, |_, id| {
        Loan::empty(LoanId::new(id))
    }) {
        Ok(committed) => common::accepted(status, accepted_id, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn issue_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::IssueLoanRequest>,
) -> Response {
    let agg = AggregateId::new();
    let member_id = body.member_id;
    let cmd = LoanCommand::Issue(IssueLoan {
        tenant_id: tenant.tenant_id(),
        loan_id: LoanId::new(agg),
        member_id,
        principal: body.principal,
        annual_rate_bp: body.annual_rate_bp,
        tenure_months: body.tenure_months,
        mode: body.mode,
        issued_on: body.issued_on.unwrap_or_else(common::today),
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "loans.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }
    if let Err(resp) = common::require_active_member(&services, tenant.tenant_id(), member_id) {
        return resp;
    }

    dispatch_loan(&services, tenant.tenant_id(), agg, cmd, agg.to_string(), StatusCode::CREATED)
}

pub async fn list_loans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "loans.read") {
        return resp;
    }
    match services.views(tenant.tenant_id()) {
        Ok(views) => Json(views.loans.list(tenant.tenant_id())).into_response(),
        Err(e) => errors::rebuild_error_to_response(e),
    }
}

pub async fn get_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "loans.read") {
        return resp;
    }
    let agg = match common::parse_id(&id, "loan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let views = match services.views(tenant.tenant_id()) {
        Ok(v) => v,
        Err(e) => return errors::rebuild_error_to_response(e),
    };
    match views.loans.get(tenant.tenant_id(), &LoanId::new(agg)) {
        Some(loan) => Json(loan).into_response(),
        None => errors::not_found("loan"),
    }
}

pub async fn record_repayment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RepaymentRequest>,
) -> Response {
    let agg = match common::parse_id(&id, "loan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let repayment_id = Uuid::now_v7();
    let cmd = LoanCommand::RecordRepayment(RecordRepayment {
        tenant_id: tenant.tenant_id(),
        loan_id: LoanId::new(agg),
        repayment_id,
        principal: body.principal,
        interest: body.interest,
        mode: body.mode,
        paid_on: body.paid_on.unwrap_or_else(common::today),
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "loans.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }

    dispatch_loan(
        &services,
        tenant.tenant_id(),
        agg,
        cmd,
        repayment_id.to_string(),
        StatusCode::CREATED,
    )
}

pub async fn close_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CloseLoanRequest>>,
) -> Response {
    let agg = match common::parse_id(&id, "loan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let closed_on = body
        .map(|Json(b)| b)
        .unwrap_or_default()
        .closed_on
        .unwrap_or_else(common::today);
    let cmd = LoanCommand::Close(CloseLoan {
        tenant_id: tenant.tenant_id(),
        loan_id: LoanId::new(agg),
        closed_on,
        occurred_at: Utc::now(),
    });

    let cmd = match CmdAuth::new(cmd, "loans.write").check(&tenant, &principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(&services, tenant.tenant_id()) {
        return resp;
    }

    dispatch_loan(&services, tenant.tenant_id(), agg, cmd, agg.to_string(), StatusCode::OK)
}
