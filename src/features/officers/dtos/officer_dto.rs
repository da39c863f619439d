use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::issues::models::IssueStatus;

/// Request DTO for an officer's progress update
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProgressDto {
    pub status: IssueStatus,
    #[validate(range(min = 0, max = 100))]
    pub progress_percentage: i16,
    /// Reference to a photo of the work done
    #[validate(length(min = 1, max = 1024))]
    pub work_image_ref: Option<String>,
}
