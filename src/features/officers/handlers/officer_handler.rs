use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireOfficer;
use crate::features::issues::dtos::IssueResponseDto;
use crate::features::officers::dtos::UpdateProgressDto;
use crate::features::officers::services::OfficerService;
use crate::shared::types::ApiResponse;

/// List issues assigned to the authenticated officer
#[utoipa::path(
    get,
    path = "/api/officer/issues",
    responses(
        (status = 200, description = "Assigned issues", body = ApiResponse<Vec<IssueResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Officer access required")
    ),
    security(("bearer_auth" = [])),
    tag = "officer"
)]
pub async fn list_assigned_issues(
    RequireOfficer(user): RequireOfficer,
    State(service): State<Arc<OfficerService>>,
) -> Result<Json<ApiResponse<Vec<IssueResponseDto>>>> {
    let issues = service.assigned_issues(&user).await?;
    let dtos: Vec<IssueResponseDto> = issues.into_iter().map(|i| i.into()).collect();
    Ok(Json(ApiResponse::success(Some(dtos), None, None)))
}

/// Update status and progress of an assigned issue
#[utoipa::path(
    patch,
    path = "/api/officer/issues/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Issue ID")
    ),
    request_body = UpdateProgressDto,
    responses(
        (status = 200, description = "Progress updated", body = ApiResponse<IssueResponseDto>),
        (status = 400, description = "Invalid progress or status transition"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Issue not assigned to this officer"),
        (status = 404, description = "Issue not found"),
        (status = 409, description = "Issue changed since it was read")
    ),
    security(("bearer_auth" = [])),
    tag = "officer"
)]
pub async fn update_progress(
    RequireOfficer(user): RequireOfficer,
    State(service): State<Arc<OfficerService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateProgressDto>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    let issue = service.update_progress(&user, id, &dto).await?;
    Ok(Json(ApiResponse::success(
        Some(issue.into()),
        Some("Progress updated successfully".to_string()),
        None,
    )))
}
