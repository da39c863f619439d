use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::auth::guards::{RequireAuthority, RequireCitizen};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::{
    IssueResponseDto, RecomputeResponseDto, ReportOutcomeKind, SubmitReportDto,
    SubmitReportResponseDto,
};
use crate::features::issues::services::ReportService;
use crate::shared::constants::TRENDING_LIMIT;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// State for issue handlers
#[derive(Clone)]
pub struct IssueState {
    pub report_service: Arc<ReportService>,
}

/// Submit a civic issue report
#[utoipa::path(
    post,
    path = "/api/issues/report",
    request_body = SubmitReportDto,
    responses(
        (status = 201, description = "New issue created", body = ApiResponse<SubmitReportResponseDto>),
        (status = 200, description = "Merged into an existing issue", body = ApiResponse<SubmitReportResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "User already reported this issue"),
        (status = 503, description = "Temporarily unavailable, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn submit_report(
    RequireCitizen(user): RequireCitizen,
    State(state): State<IssueState>,
    AppJson(dto): AppJson<SubmitReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitReportResponseDto>>)> {
    let outcome = state.report_service.submit_report(&user, &dto).await?;

    let (status, message) = match outcome.kind {
        ReportOutcomeKind::AlreadyReported => {
            return Err(AppError::DuplicateReport(outcome.issue.id));
        }
        ReportOutcomeKind::Created => (StatusCode::CREATED, "Issue reported successfully"),
        ReportOutcomeKind::Merged => (
            StatusCode::OK,
            "Similar issue already exists; your report was added to it",
        ),
    };

    let issue = outcome.issue;
    let dto = SubmitReportResponseDto {
        outcome: outcome.kind,
        issue_id: issue.id,
        report_count: issue.report_count,
        priority_score: issue.priority_score,
        priority: issue.priority,
        severity: issue.severity,
        assigned_officer_id: issue.assigned_officer_id,
    };

    Ok((
        status,
        Json(ApiResponse::success(Some(dto), Some(message.to_string()), None)),
    ))
}

/// List issues the authenticated user has reported
#[utoipa::path(
    get,
    path = "/api/issues/mine",
    responses(
        (status = 200, description = "Issues reported by the user", body = ApiResponse<Vec<IssueResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn list_my_issues(
    RequireCitizen(user): RequireCitizen,
    State(state): State<IssueState>,
) -> Result<Json<ApiResponse<Vec<IssueResponseDto>>>> {
    let issues = state.report_service.list_by_reporter(&user.sub).await?;
    let dtos: Vec<IssueResponseDto> = issues.into_iter().map(|i| i.into()).collect();
    Ok(Json(ApiResponse::success(Some(dtos), None, None)))
}

/// Get issue by ID
#[utoipa::path(
    get,
    path = "/api/issues/{id}",
    params(
        ("id" = Uuid, Path, description = "Issue ID")
    ),
    responses(
        (status = 200, description = "Issue found", body = ApiResponse<IssueResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn get_issue(
    _user: AuthenticatedUser,
    State(state): State<IssueState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    let issue = state.report_service.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(Some(issue.into()), None, None)))
}

/// Issues ordered by live priority (authority dashboard)
#[utoipa::path(
    get,
    path = "/api/issues/ranking",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Issues by priority", body = ApiResponse<Vec<IssueResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Authority access required")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn get_priority_ranking(
    RequireAuthority(_user): RequireAuthority,
    State(state): State<IssueState>,
    AppQuery(pagination): AppQuery<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<IssueResponseDto>>>> {
    let (issues, total) = state
        .report_service
        .get_priority_ranking(pagination.offset(), pagination.limit())
        .await?;
    let dtos: Vec<IssueResponseDto> = issues.into_iter().map(|i| i.into()).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta { total }),
    )))
}

/// Most reported issues
#[utoipa::path(
    get,
    path = "/api/issues/trending",
    responses(
        (status = 200, description = "Most reported issues", body = ApiResponse<Vec<IssueResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Authority access required")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn list_trending(
    RequireAuthority(_user): RequireAuthority,
    State(state): State<IssueState>,
) -> Result<Json<ApiResponse<Vec<IssueResponseDto>>>> {
    let issues = state.report_service.list_trending(TRENDING_LIMIT).await?;
    let dtos: Vec<IssueResponseDto> = issues.into_iter().map(|i| i.into()).collect();
    Ok(Json(ApiResponse::success(Some(dtos), None, None)))
}

/// Rescore every issue now
#[utoipa::path(
    post,
    path = "/api/issues/priorities/recompute",
    responses(
        (status = 200, description = "Recompute finished", body = ApiResponse<RecomputeResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Authority access required")
    ),
    security(("bearer_auth" = [])),
    tag = "issues"
)]
pub async fn recompute_priorities(
    RequireAuthority(user): RequireAuthority,
    State(state): State<IssueState>,
) -> Result<Json<ApiResponse<RecomputeResponseDto>>> {
    tracing::info!(requested_by = %user.sub, "Manual priority recompute");
    let updated = state.report_service.recompute_all_priorities().await?;
    Ok(Json(ApiResponse::success(
        Some(RecomputeResponseDto { updated }),
        Some(format!("{} issues updated", updated)),
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::features::issues::routes;
    use crate::shared::test_helpers::{
        report_service, with_user, FixedScoresBackend, InMemoryIssueStore,
    };
    use crate::shared::test_helpers::{authority, citizen, officer};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn body(description: &str) -> Value {
        json!({
            "description": description,
            "location_name": "Main Road",
            "latitude": 12.9716,
            "longitude": 77.5946
        })
    }

    fn server_for(
        store: Arc<InMemoryIssueStore>,
        user: crate::features::auth::model::AuthenticatedUser,
    ) -> TestServer {
        let service = report_service(store, Arc::new(FixedScoresBackend::repeat(0.9)));
        TestServer::new(with_user(routes::routes(service), user)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_created_then_merged_then_conflict() {
        let store = Arc::new(InMemoryIssueStore::new());

        let first = server_for(store.clone(), citizen("u1"))
            .post("/api/issues/report")
            .json(&body("Large pothole on Main Road"))
            .await;
        first.assert_status(StatusCode::CREATED);
        let created: Value = first.json();
        assert_eq!(created["data"]["outcome"], "created");
        assert_eq!(created["data"]["report_count"], 1);

        let second = server_for(store.clone(), citizen("u2"))
            .post("/api/issues/report")
            .json(&body("Pothole on Main Rd causing issue"))
            .await;
        second.assert_status_ok();
        let merged: Value = second.json();
        assert_eq!(merged["data"]["outcome"], "merged");
        assert_eq!(merged["data"]["report_count"], 2);
        assert_eq!(merged["data"]["issue_id"], created["data"]["issue_id"]);

        let again = server_for(store.clone(), citizen("u2"))
            .post("/api/issues/report")
            .json(&body("Pothole on Main Rd causing issue"))
            .await;
        again.assert_status(StatusCode::CONFLICT);
        let conflict: Value = again.json();
        assert_eq!(conflict["message"], "You have already reported this issue.");
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_body() {
        let server = server_for(Arc::new(InMemoryIssueStore::new()), citizen("u1"));
        let response = server
            .post("/api/issues/report")
            .json(&json!({
                "description": "",
                "location_name": "Main Road",
                "latitude": 12.9,
                "longitude": 77.5
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/issues/report")
            .json(&json!({"description": "Leak"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ranking_requires_authority() {
        let store = Arc::new(InMemoryIssueStore::new());
        server_for(store.clone(), citizen("u1"))
            .get("/api/issues/ranking")
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server_for(store.clone(), officer("o1"))
            .get("/api/issues/trending")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server_for(store, authority("a1"))
            .get("/api/issues/ranking?page=1&page_size=5")
            .await;
        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_mine_includes_merged_issues() {
        let store = Arc::new(InMemoryIssueStore::new());
        server_for(store.clone(), citizen("u1"))
            .post("/api/issues/report")
            .json(&body("Large pothole on Main Road"))
            .await
            .assert_status(StatusCode::CREATED);
        server_for(store.clone(), citizen("u2"))
            .post("/api/issues/report")
            .json(&body("Pothole on Main Rd"))
            .await
            .assert_status_ok();

        let response = server_for(store, citizen("u2")).get("/api/issues/mine").await;
        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["report_count"], 2);
    }

    #[tokio::test]
    async fn test_get_unknown_issue_is_404() {
        let server = server_for(Arc::new(InMemoryIssueStore::new()), citizen("u1"));
        server
            .get(&format!("/api/issues/{}", uuid::Uuid::now_v7()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recompute_endpoint() {
        let server = server_for(Arc::new(InMemoryIssueStore::new()), authority("a1"));
        let response = server.post("/api/issues/priorities/recompute").await;
        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["data"]["updated"], 0);
    }
}
