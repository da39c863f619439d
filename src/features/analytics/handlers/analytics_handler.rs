use std::sync::Arc;

use axum::{extract::State, Json};

use crate::core::error::Result;
use crate::core::extractor::AppQuery;
use crate::features::analytics::dtos::RankingQuery;
use crate::features::analytics::services::AnalyticsService;
use crate::features::auth::guards::RequireAuthority;
use crate::features::prioritization::{DuplicatePair, RankedIssue};
use crate::shared::types::{ApiResponse, Meta};

/// Offline issue ranking for the analytics dashboard
#[utoipa::path(
    get,
    path = "/api/analytics/ranking",
    params(RankingQuery),
    responses(
        (status = 200, description = "Ranked issues", body = ApiResponse<Vec<RankedIssue>>),
        (status = 400, description = "Unknown strategy"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Authority access required")
    ),
    security(("bearer_auth" = [])),
    tag = "analytics"
)]
pub async fn get_ranking(
    RequireAuthority(_user): RequireAuthority,
    State(service): State<Arc<AnalyticsService>>,
    AppQuery(query): AppQuery<RankingQuery>,
) -> Result<Json<ApiResponse<Vec<RankedIssue>>>> {
    let ranked = service.rank(query.strategy).await?;
    let total = ranked.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(ranked),
        None,
        Some(Meta { total }),
    )))
}

/// Likely duplicate issue pairs
#[utoipa::path(
    get,
    path = "/api/analytics/duplicates",
    responses(
        (status = 200, description = "Duplicate pairs", body = ApiResponse<Vec<DuplicatePair>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Authority access required")
    ),
    security(("bearer_auth" = [])),
    tag = "analytics"
)]
pub async fn get_duplicates(
    RequireAuthority(_user): RequireAuthority,
    State(service): State<Arc<AnalyticsService>>,
) -> Result<Json<ApiResponse<Vec<DuplicatePair>>>> {
    let pairs = service.duplicates().await?;
    Ok(Json(ApiResponse::success(Some(pairs), None, None)))
}
