use axum::{routing::get, Router};

pub mod admin;
pub mod admin_fund;
pub mod common;
pub mod expenses;
pub mod loans;
pub mod members;
pub mod passbook;
pub mod reports;
pub mod subscription;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/members", members::router())
        .nest("/passbook/:member_id", passbook::router())
        .nest("/loans", loans::router())
        .nest("/expenses", expenses::router())
        .nest("/admin-fund", admin_fund::router())
        .nest("/subscription", subscription::router())
        .nest("/reports", reports::router())
        .nest("/admin", admin::router())
}
