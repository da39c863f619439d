use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::error::{AppError, Result};

/// Issue status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Solved,
}

impl IssueStatus {
    pub fn rank(self) -> u8 {
        match self {
            IssueStatus::Pending => 0,
            IssueStatus::InProgress => 1,
            IssueStatus::Solved => 2,
        }
    }

    /// Status only moves forward; re-sending the current status is allowed
    pub fn ensure_transition(self, next: IssueStatus) -> Result<()> {
        if next.rank() < self.rank() {
            return Err(AppError::BadRequest(format!(
                "Cannot move issue from {} back to {}",
                self, next
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueStatus::Pending => write!(f, "pending"),
            IssueStatus::InProgress => write!(f, "in_progress"),
            IssueStatus::Solved => write!(f, "solved"),
        }
    }
}

/// Database model for issue
#[derive(Debug, Clone, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub reporter_id: String,
    pub reporter_name: Option<String>,
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_ref: Option<String>,
    pub status: IssueStatus,
    pub report_count: i32,
    pub is_urgent: bool,
    pub severity: i16,
    pub priority_score: f64,
    pub priority: i16,
    pub assigned_officer_id: Option<Uuid>,
    pub progress_percentage: i16,
    pub work_image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new issue
#[derive(Debug, Clone)]
pub struct CreateIssue {
    pub reporter_id: String,
    pub reporter_name: Option<String>,
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_ref: Option<String>,
    pub is_urgent: bool,
}

/// Severity, score, tier and officer, written in one statement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityUpdate {
    pub severity: i16,
    pub priority_score: f64,
    pub priority: i16,
    pub assigned_officer_id: Option<Uuid>,
}

impl PriorityUpdate {
    pub fn differs_from(&self, issue: &Issue) -> bool {
        self.severity != issue.severity
            || self.priority_score != issue.priority_score
            || self.priority != issue.priority
            || self.assigned_officer_id != issue.assigned_officer_id
    }
}

/// Progress update applied by the assigned officer
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub status: IssueStatus,
    pub progress_percentage: i16,
    pub work_image_ref: Option<String>,
}
