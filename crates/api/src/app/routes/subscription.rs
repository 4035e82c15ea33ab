use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use sahakari_billing::{
    CancelSubscription, Plan, RenewSubscription, StartSubscription, Subscription, SubscriptionCommand,
    SUBSCRIPTION_AGGREGATE_TYPE, SUBSCRIPTION_ID,
};

use crate::app::routes::common::{self, CmdAuth};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_subscription))
        .route("/plans", get(list_plans))
        .route("/start", post(start_subscription))
        .route("/renew", post(renew_subscription))
        .route("/cancel", post(cancel_subscription))
}

/// Subscription commands are never gated on the subscription itself.
fn dispatch_subscription(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    cmd: SubscriptionCommand,
    status: StatusCode,
) -> Response {
    let cmd = match CmdAuth::new(cmd, "subscription.write").check(tenant, principal) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match services.dispatch::<Subscription>(
        tenant.tenant_id(),
        SUBSCRIPTION_ID,
        SUBSCRIPTION_AGGREGATE_TYPE,
        cmd,
        |_, id| Subscription::empty(id),
    ) {
        Ok(committed) => common::accepted(status, SUBSCRIPTION_ID, &committed),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require_read(&tenant, &principal, "subscription.read") {
        return resp;
    }
    let status = match services.subscription_status(tenant.tenant_id()) {
        Ok(s) => s,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let views = match services.views(tenant.tenant_id()) {
        Ok(v) => v,
        Err(e) => return errors::rebuild_error_to_response(e),
    };
    Json(dto::SubscriptionView {
        status,
        allows_writes: status.allows_writes(),
        checked_at: Utc::now(),
        subscription: views.subscription.get(tenant.tenant_id()),
    })
    .into_response()
}

pub async fn list_plans() -> Json<Vec<dto::PlanView>> {
    Json(Plan::ALL.into_iter().map(dto::PlanView::from).collect())
}

pub async fn start_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StartSubscriptionRequest>,
) -> Response {
    let cmd = SubscriptionCommand::Start(StartSubscription {
        tenant_id: tenant.tenant_id(),
        plan: body.plan,
        started_at: Utc::now(),
        payment_reference: body.payment_reference,
    });
    dispatch_subscription(&services, &tenant, &principal, cmd, StatusCode::CREATED)
}

pub async fn renew_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RenewSubscriptionRequest>,
) -> Response {
    let cmd = SubscriptionCommand::Renew(RenewSubscription {
        tenant_id: tenant.tenant_id(),
        plan: body.plan,
        renewed_at: Utc::now(),
        payment_reference: body.payment_reference,
    });
    dispatch_subscription(&services, &tenant, &principal, cmd, StatusCode::OK)
}

pub async fn cancel_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::ReasonRequest>>,
) -> Response {
    let cmd = SubscriptionCommand::Cancel(CancelSubscription {
        tenant_id: tenant.tenant_id(),
        cancelled_at: Utc::now(),
        reason: body.map(|Json(b)| b).unwrap_or_default().reason,
    });
    dispatch_subscription(&services, &tenant, &principal, cmd, StatusCode::OK)
}
