use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};

use crate::features::officers::handlers;
use crate::features::officers::services::OfficerService;

/// Create routes for the officer dashboard
///
/// Routes require the auth middleware applied by the caller
pub fn routes(service: Arc<OfficerService>) -> Router {
    Router::new()
        .route("/api/officer/issues", get(handlers::list_assigned_issues))
        .route(
            "/api/officer/issues/{id}/progress",
            patch(handlers::update_progress),
        )
        .with_state(service)
}
