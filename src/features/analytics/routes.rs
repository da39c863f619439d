use std::sync::Arc;

use axum::{routing::get, Router};

use crate::features::analytics::handlers;
use crate::features::analytics::services::AnalyticsService;

/// Create routes for offline analytics
///
/// Routes require the auth middleware applied by the caller
pub fn routes(service: Arc<AnalyticsService>) -> Router {
    Router::new()
        .route("/api/analytics/ranking", get(handlers::get_ranking))
        .route("/api/analytics/duplicates", get(handlers::get_duplicates))
        .with_state(service)
}
