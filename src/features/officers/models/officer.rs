use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for officer
#[derive(Debug, Clone, FromRow)]
pub struct Officer {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub department: String,
    pub contact_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Officer with the number of non-solved issues currently assigned
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OfficerLoad {
    pub officer_id: Uuid,
    pub open_issues: i64,
    pub created_at: DateTime<Utc>,
}
