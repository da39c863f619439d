use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::issues::models::{Issue, IssueStatus};
use crate::shared::validation::{finite_latitude, finite_longitude, not_blank};

/// Request DTO for submitting a report
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitReportDto {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(custom(function = "not_blank"), length(max = 5000))]
    pub description: String,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub location_name: String,
    #[validate(custom(function = "finite_latitude"))]
    pub latitude: f64,
    #[validate(custom(function = "finite_longitude"))]
    pub longitude: f64,
    /// Reference to an uploaded photo (object key or URL)
    #[validate(length(max = 1024))]
    pub image_ref: Option<String>,
    /// Reporter marks the issue as urgent; forces high severity
    #[serde(default)]
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcomeKind {
    Created,
    Merged,
    AlreadyReported,
}

/// Response DTO for a submitted report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitReportResponseDto {
    pub outcome: ReportOutcomeKind,
    pub issue_id: Uuid,
    pub report_count: i32,
    pub priority_score: f64,
    pub priority: i16,
    pub severity: i16,
    pub assigned_officer_id: Option<Uuid>,
}

/// Response DTO for issue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueResponseDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_ref: Option<String>,
    pub reporter_name: Option<String>,
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

impl From<Issue> for IssueResponseDto {
    fn from(i: Issue) -> Self {
        Self {
            id: i.id,
            title: i.title,
            description: i.description,
            location_name: i.location_name,
            latitude: i.latitude,
            longitude: i.longitude,
            image_ref: i.image_ref,
            reporter_name: i.reporter_name,
            status: i.status,
            report_count: i.report_count,
            is_urgent: i.is_urgent,
            severity: i.severity,
            priority_score: i.priority_score,
            priority: i.priority,
            assigned_officer_id: i.assigned_officer_id,
            progress_percentage: i.progress_percentage,
            work_image_ref: i.work_image_ref,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

/// Response DTO for a priority recompute run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecomputeResponseDto {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SubmitReportDto {
        SubmitReportDto {
            title: None,
            description: "Large pothole on Main Road".to_string(),
            location_name: "Main Road".to_string(),
            latitude: 12.9716,
            longitude: 77.5946,
            image_ref: None,
            is_urgent: false,
        }
    }

    #[test]
    fn test_valid_report_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut dto = valid();
        dto.description = "  ".to_string();
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));

        let mut dto = valid();
        dto.location_name = String::new();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_coordinates_must_be_finite_and_in_range() {
        for (lat, lon) in [(91.0, 0.0), (0.0, -180.5), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
            let mut dto = valid();
            dto.latitude = lat;
            dto.longitude = lon;
            assert!(dto.validate().is_err(), "{} {}", lat, lon);
        }
    }

    #[test]
    fn test_is_urgent_defaults_to_false() {
        let dto: SubmitReportDto = serde_json::from_str(
            r#"{"description":"Leak","location_name":"Gate 2","latitude":1.0,"longitude":2.0}"#,
        )
        .unwrap();
        assert!(!dto.is_urgent);
        assert!(dto.title.is_none());
    }
}
