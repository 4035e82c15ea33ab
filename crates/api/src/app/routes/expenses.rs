use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use sahakari_treasury::{
    ExpenseCommand, ExpenseLedger, RecordExpense, ReverseExpense, EXPENSE_LEDGER_AGGREGATE_TYPE,
    EXPENSE_LEDGER_ID,
};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_expense).get(list_expenses))
        .route("/:id/reverse", post(reverse_expense))
}

fn dispatch_expense(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    cmd: ExpenseCommand,
    expense_id: Uuid,
    status: StatusCode,
) -> Response {
    let cmd = match CmdAuth::new(cmd, "expenses.write").check(tenant, principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = common::ensure_writable(services, tenant.tenant_id()) {
        return resp;
    }
    match services.dispatch::<ExpenseLedger>(
        tenant.tenant_id(),
        EXPENSE_LEDGER_ID,
        EXPENSE_LEDGER_AGGREGATE_TYPE,
        cmd,
        |_, id| ExpenseLedger::empty(id),
    ) {
        Ok(committed) => common::accepted(status, expense_id, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordExpenseRequest>,
) -> Response {
    let expense_id = Uuid::now_v7();
    let cmd = ExpenseCommand::Record(RecordExpense {
        tenant_id: tenant.tenant_id(),
        expense_id,
        category: body.category,
        amount: body.amount,
        mode: body.mode,
        spent_on: body.spent_on.unwrap_or_else(common::today),
        description: body.description,
        occurred_at: Utc::now(),
    });
    dispatch_expense(&services, &tenant, &principal, cmd, expense_id, StatusCode::CREATED)
}

pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "expenses.read") {
        return resp;
    }
    match services.load(tenant.tenant_id(), EXPENSE_LEDGER_ID, |_, id| ExpenseLedger::empty(id)) {
        Ok(ledger) => Json(dto::ExpenseListView::from(&ledger)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reverse_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> Response {
    let expense_id: Uuid = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("expense"),
    };
    let cmd = ExpenseCommand::Reverse(ReverseExpense {
        tenant_id: tenant.tenant_id(),
        expense_id,
        reason: body.map(|Json(b)| b).unwrap_or_default().reason,
        occurred_at: Utc::now(),
    });
    dispatch_expense(&services, &tenant, &principal, cmd, expense_id, StatusCode::OK)
}
