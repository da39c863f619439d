use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::issues::handlers::{self, IssueState};
use crate::features::issues::services::ReportService;

/// Create routes for the issues feature
///
/// All routes require the auth middleware applied by the caller
pub fn routes(report_service: Arc<ReportService>) -> Router {
    let state = IssueState { report_service };

    Router::new()
        .route("/api/issues/report", post(handlers::submit_report))
        .route("/api/issues/mine", get(handlers::list_my_issues))
        .route("/api/issues/ranking", get(handlers::get_priority_ranking))
        .route("/api/issues/trending", get(handlers::list_trending))
        .route(
            "/api/issues/priorities/recompute",
            post(handlers::recompute_priorities),
        )
        .route("/api/issues/{id}", get(handlers::get_issue))
        .with_state(state)
}
