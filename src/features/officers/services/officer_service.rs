use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::models::{Issue, IssueStatus, ProgressUpdate};
use crate::features::issues::services::{IssueStore, ReportService};
use crate::features::officers::dtos::UpdateProgressDto;
use crate::features::officers::models::Officer;
use crate::shared::validation::describe_errors;

/// Service for the officer dashboard
pub struct OfficerService {
    store: Arc<dyn IssueStore>,
    report_service: Arc<ReportService>,
}

impl OfficerService {
    pub fn new(store: Arc<dyn IssueStore>, report_service: Arc<ReportService>) -> Self {
        Self {
            store,
            report_service,
        }
    }

    async fn officer_for(&self, user: &AuthenticatedUser) -> Result<Officer> {
        self.store
            .find_officer_by_user(&user.sub)
            .await?
            .ok_or_else(|| AppError::Forbidden("No officer profile for this user".to_string()))
    }

    /// Issues assigned to the calling officer
    pub async fn assigned_issues(&self, user: &AuthenticatedUser) -> Result<Vec<Issue>> {
        let officer = self.officer_for(user).await?;
        self.report_service.refresh_before_read().await?;
        self.store.list_assigned_to(officer.id).await
    }

    /// Update status and progress of an issue assigned to the caller.
    /// Status moves forward only; `solved` sets progress to 100.
    pub async fn update_progress(
        &self,
        user: &AuthenticatedUser,
        issue_id: Uuid,
        dto: &UpdateProgressDto,
    ) -> Result<Issue> {
        dto.validate()
            .map_err(|e| AppError::Validation(describe_errors(&e)))?;

        let officer = self.officer_for(user).await?;
        let issue = self
            .store
            .get(issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", issue_id)))?;

        if issue.assigned_officer_id != Some(officer.id) {
            return Err(AppError::Forbidden(
                "Issue is not assigned to you".to_string(),
            ));
        }

        issue.status.ensure_transition(dto.status)?;

        let progress_percentage = if dto.status == IssueStatus::Solved {
            100
        } else {
            dto.progress_percentage
        };

        let updated = self
            .store
            .update_progress(
                issue_id,
                officer.id,
                &ProgressUpdate {
                    status: dto.status,
                    progress_percentage,
                    work_image_ref: dto.work_image_ref.clone(),
                },
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict(
                    "Issue was updated concurrently, reload and try again".to_string(),
                )
            })?;

        tracing::info!(
            issue_id = %issue_id,
            officer_id = %officer.id,
            status = %updated.status,
            progress = updated.progress_percentage,
            "Issue progress updated"
        );

        Ok(updated)
    }
}
