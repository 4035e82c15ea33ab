use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::app::errors;
use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/projections/rebuild", post(rebuild_projections))
}

/// Drop the caller's society views and replay them from the event store.
pub async fn rebuild_projections(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = CmdAuth::new((), "projections.rebuild").check(&tenant, &principal) {
        return resp;
    }
    match services.rebuild(tenant.tenant_id()) {
        Ok(report) => {
            info!(
                principal_id = %principal.principal_id(),
                events = report.events_replayed,
                "projection rebuild requested"
            );
            Json(report).into_response()
        }
        Err(e) => errors::rebuild_error_to_response(e),
    }
}
