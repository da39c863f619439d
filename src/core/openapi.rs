use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::analytics::handlers as analytics_handlers;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::{
    dtos as issues_dtos, handlers as issues_handlers, models as issues_models,
};
use crate::features::officers::{dtos as officers_dtos, handlers as officers_handlers};
use crate::features::prioritization::{DuplicatePair, RankedIssue, RankingStrategyKind};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Issues
        issues_handlers::submit_report,
        issues_handlers::list_my_issues,
        issues_handlers::get_issue,
        issues_handlers::get_priority_ranking,
        issues_handlers::list_trending,
        issues_handlers::recompute_priorities,
        // Officer
        officers_handlers::list_assigned_issues,
        officers_handlers::update_progress,
        // Analytics
        analytics_handlers::get_ranking,
        analytics_handlers::get_duplicates,
    ),
    components(
        schemas(
            Meta,
            AuthenticatedUser,
            // Issues
            issues_models::IssueStatus,
            issues_dtos::SubmitReportDto,
            issues_dtos::ReportOutcomeKind,
            issues_dtos::SubmitReportResponseDto,
            issues_dtos::IssueResponseDto,
            issues_dtos::RecomputeResponseDto,
            ApiResponse<issues_dtos::SubmitReportResponseDto>,
            ApiResponse<issues_dtos::IssueResponseDto>,
            ApiResponse<Vec<issues_dtos::IssueResponseDto>>,
            ApiResponse<issues_dtos::RecomputeResponseDto>,
            // Officer
            officers_dtos::UpdateProgressDto,
            // Analytics
            RankingStrategyKind,
            RankedIssue,
            DuplicatePair,
            ApiResponse<Vec<RankedIssue>>,
            ApiResponse<Vec<DuplicatePair>>,
        )
    ),
    tags(
        (name = "issues", description = "Citizen issue reports, deduplication and live priority"),
        (name = "officer", description = "Officer dashboard for assigned issues"),
        (name = "analytics", description = "Offline ranking and duplicate analysis (read-only)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "CivicConnect API",
        version = "0.1.0",
        description = "API documentation for CivicConnect",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to the OpenAPI document
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
