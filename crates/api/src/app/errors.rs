use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use sahakari_auth::AuthzError;
use sahakari_billing::SubscriptionStatus;
use sahakari_infra::{DispatchError, RebuildError};
use sahakari_reports::ReportError;

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "concurrency_conflict", msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
        DispatchError::Deserialize(msg) => {
            error!(error = %msg, "stored event no longer decodes");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            error!(error = %msg, "event publication failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", msg)
        }
    }
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    match err {
        AuthzError::TenantMismatch => json_error(StatusCode::FORBIDDEN, "tenant_isolation", err.to_string()),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn rebuild_error_to_response(err: RebuildError) -> Response {
    error!(error = %err, "read model unavailable");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "projection_error", err.to_string())
}

pub fn report_error_to_response(err: ReportError) -> Response {
    match err {
        ReportError::InvalidPeriod { .. } => json_error(StatusCode::BAD_REQUEST, "invalid_period", err.to_string()),
        ReportError::Csv(_) | ReportError::Io(_) => {
            error!(error = %err, "report export failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_error", err.to_string())
        }
    }
}

pub fn subscription_inactive(status: SubscriptionStatus) -> Response {
    json_error(
        StatusCode::PAYMENT_REQUIRED,
        "subscription_inactive",
        format!("subscription is {status:?}; renew to record transactions"),
    )
}

pub fn invalid_id(what: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
