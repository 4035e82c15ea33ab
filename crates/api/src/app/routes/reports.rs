//! Read-only reports folded from the society ledger view.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::warn;

use sahakari_members::MemberId;
use sahakari_reports::{
    csv::{write_ledger, write_loan_book, write_statement},
    liquidity_snapshot, loan_book, profit_and_loss, running_balance, society_summary, LedgerRecord,
    Period, ReportError,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/liquidity", get(liquidity))
        .route("/summary", get(summary))
        .route("/profit-and-loss", get(profit))
        .route("/loan-book", get(loans))
        .route("/export/ledger.csv", get(export_ledger))
        .route("/export/loans.csv", get(export_loans))
        .route("/export/passbook/:file", get(export_passbook))
}

fn records_for(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
) -> Result<Vec<LedgerRecord>, Response> {
    common::require_read(tenant, principal, "reports.read")?;
    services
        .ledger_records(tenant.tenant_id())
        .map_err(errors::rebuild_error_to_response)
}

fn csv_response(filename: &str, write: impl FnOnce(&mut Vec<u8>) -> Result<(), ReportError>) -> Response {
    let mut body = Vec::new();
    if let Err(e) = write(&mut body) {
        return errors::report_error_to_response(e);
    }
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

pub async fn liquidity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::AsOfQuery>,
) -> Response {
    let records = match records_for(&services, &tenant, &principal) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let snapshot = liquidity_snapshot(&records, q.as_of);
    let negative = snapshot.negative_modes();
    if !negative.is_empty() {
        warn!(tenant_id = %tenant.tenant_id(), modes = ?negative, "payment mode balance below zero");
    }
    Json(snapshot).into_response()
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::AsOfQuery>,
) -> Response {
    let records = match records_for(&services, &tenant, &principal) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let member_count = match services.views(tenant.tenant_id()) {
        Ok(views) => views.members.active_count(tenant.tenant_id()),
        Err(e) => return errors::rebuild_error_to_response(e),
    };
    Json(society_summary(&records, member_count, q.as_of)).into_response()
}

pub async fn profit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PeriodQuery>,
) -> Response {
    let period = match Period::new(q.from, q.to) {
        Ok(p) => p,
        Err(e) => return errors::report_error_to_response(e),
    };
    match records_for(&services, &tenant, &principal) {
        Ok(records) => Json(profit_and_loss(&records, period)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn loans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match records_for(&services, &tenant, &principal) {
        Ok(records) => Json(loan_book(&records)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn export_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match records_for(&services, &tenant, &principal) {
        Ok(records) => csv_response("ledger.csv", |out| write_ledger(out, &records)),
        Err(resp) => resp,
    }
}

pub async fn export_loans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match records_for(&services, &tenant, &principal) {
        Ok(records) => {
            let book = loan_book(&records);
            csv_response("loans.csv", |out| write_loan_book(out, &book))
        }
        Err(resp) => resp,
    }
}

/// `GET /export/passbook/{member_id}.csv`
pub async fn export_passbook(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(file): Path<String>,
) -> Response {
    let Some(raw_id) = file.strip_suffix(".csv") else {
        return errors::not_found("export");
    };
    let member_id = match common::parse_id(raw_id, "member") {
        Ok(v) => MemberId::new(v),
        Err(resp) => return resp,
    };
    let records = match records_for(&services, &tenant, &principal) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.views(tenant.tenant_id()) {
        Ok(views) if views.members.get(tenant.tenant_id(), &member_id).is_some() => {}
        Ok(_) => return errors::not_found("member"),
        Err(e) => return errors::rebuild_error_to_response(e),
    }

    let statement = running_balance(&records, member_id);
    csv_response(&format!("passbook-{member_id}.csv"), |out| write_statement(out, &statement))
}
