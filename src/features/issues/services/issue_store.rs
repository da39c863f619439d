use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::error::{handle_db_error, Result};
use crate::features::issues::models::{CreateIssue, Issue, PriorityUpdate, ProgressUpdate};
use crate::features::officers::models::{Officer, OfficerLoad};
use crate::features::prioritization::GeoQuery;

const ISSUE_COLUMNS: &str = "id, reporter_id, reporter_name, title, description, location_name, \
     latitude, longitude, image_ref, status, report_count, is_urgent, severity, priority_score, \
     priority, assigned_officer_id, progress_percentage, work_image_ref, created_at, updated_at";

/// Keyset cursor over issues in `(created_at, id)` order
pub type IssueCursor = (DateTime<Utc>, Uuid);

/// Persistence for issues, their reporters and officer lookups
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn IssueTransaction>>;

    /// Candidates for similarity matching, ordered by `(created_at, id)`
    async fn find_nearby(&self, query: &GeoQuery) -> Result<Vec<Issue>>;

    async fn get(&self, id: Uuid) -> Result<Option<Issue>>;

    /// The row guarded by the `(description, latitude, longitude)` unique constraint
    async fn find_exact(
        &self,
        description: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Issue>>;

    async fn has_reported(&self, issue_id: Uuid, user_id: &str) -> Result<bool>;

    /// `priority_score DESC, report_count DESC, created_at ASC`, with total
    async fn list_ranked(&self, offset: i64, limit: i64) -> Result<(Vec<Issue>, i64)>;

    async fn list_trending(&self, limit: i64) -> Result<Vec<Issue>>;

    async fn list_reported_by(&self, user_id: &str) -> Result<Vec<Issue>>;

    async fn list_assigned_to(&self, officer_id: Uuid) -> Result<Vec<Issue>>;

    /// Next page of issues after `cursor` in `(created_at, id)` order
    async fn list_batch(&self, cursor: Option<IssueCursor>, limit: i64) -> Result<Vec<Issue>>;

    async fn find_officer_by_user(&self, user_id: &str) -> Result<Option<Officer>>;

    /// Applies only while the issue is still assigned to `officer_id` and its
    /// status has not moved past `update.status`; `None` otherwise
    async fn update_progress(
        &self,
        issue_id: Uuid,
        officer_id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<Option<Issue>>;
}

/// One atomic unit of work. Dropping without `commit` rolls back.
#[async_trait]
pub trait IssueTransaction: Send {
    async fn insert_issue(&mut self, issue: &CreateIssue) -> Result<Issue>;

    /// `false` when the (issue, user) pair already exists
    async fn attribute_report(&mut self, issue_id: Uuid, user_id: &str) -> Result<bool>;

    /// Atomic `report_count + 1`; `is_urgent` is OR-ed into the stored flag
    async fn increment_report_count(&mut self, issue_id: Uuid, is_urgent: bool) -> Result<Issue>;

    /// Row-locked read for rescoring
    async fn lock_issue(&mut self, issue_id: Uuid) -> Result<Option<Issue>>;

    async fn officer_loads(&mut self) -> Result<Vec<OfficerLoad>>;

    async fn apply_priority(&mut self, issue_id: Uuid, update: &PriorityUpdate) -> Result<Issue>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Postgres-backed issue store
pub struct PgIssueStore {
    pool: PgPool,
}

impl PgIssueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IssueStore for PgIssueStore {
    async fn begin(&self) -> Result<Box<dyn IssueTransaction>> {
        let tx = self.pool.begin().await.map_err(handle_db_error)?;
        Ok(Box::new(PgIssueTransaction { tx }))
    }

    async fn find_nearby(&self, query: &GeoQuery) -> Result<Vec<Issue>> {
        let (lat_min, lat_max) = query.lat_bounds();
        let (lon_min, lon_max) = query.lon_bounds();

        // Two index-backed branches: the (latitude, longitude) btree and the
        // location_name trigram index. Box hits always rank ahead of name-only hits.
        let sql = format!(
            r#"
            WITH boxed AS (
                SELECT {ISSUE_COLUMNS}, 0 AS match_rank
                FROM issues
                WHERE latitude BETWEEN $1 AND $2
                  AND longitude BETWEEN $3 AND $4
                ORDER BY created_at ASC, id ASC
                LIMIT $6
            ),
            named AS (
                SELECT {ISSUE_COLUMNS}, 1 AS match_rank
                FROM issues
                WHERE $5::TEXT IS NOT NULL
                  AND location_name ILIKE '%' || $5 || '%'
                  AND NOT (latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4)
                ORDER BY created_at ASC, id ASC
                LIMIT $6
            )
            SELECT {ISSUE_COLUMNS}
            FROM (SELECT * FROM boxed UNION ALL SELECT * FROM named) candidates
            ORDER BY match_rank ASC, created_at ASC, id ASC
            LIMIT $6
            "#
        );

        let issues = sqlx::query_as::<_, Issue>(&sql)
            .bind(lat_min)
            .bind(lat_max)
            .bind(lon_min)
            .bind(lon_max)
            .bind(query.location_name.as_deref().map(escape_like))
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(handle_db_error)?;

        Ok(issues)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Issue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1");
        sqlx::query_as::<_, Issue>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(handle_db_error)
    }

    async fn find_exact(
        &self,
        description: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues \
             WHERE description = $1 AND latitude = $2 AND longitude = $3"
        );
        sqlx::query_as::<_, Issue>(&sql)
            .bind(description)
            .bind(latitude)
            .bind(longitude)
            .fetch_optional(&self.pool)
            .await
            .map_err(handle_db_error)
    }

    async fn has_reported(&self, issue_id: Uuid, user_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reported_users WHERE issue_id = $1 AND user_id = $2)",
        )
        .bind(issue_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(handle_db_error)?;

        Ok(exists)
    }

    async fn list_ranked(&self, offset: i64, limit: i64) -> Result<(Vec<Issue>, i64)> {
        let sql = format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            ORDER BY priority_score DESC, report_count DESC, created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        );

        let issues = sqlx::query_as::<_, Issue>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(handle_db_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.pool)
            .await
            .map_err(handle_db_error)?;

        Ok((issues, total))
    }

    async fn list_trending(&self, limit: i64) -> Result<Vec<Issue>> {
        let sql = format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            ORDER BY report_count DESC, priority_score DESC, created_at ASC
            LIMIT $1
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(handle_db_error)
    }

    async fn list_reported_by(&self, user_id: &str) -> Result<Vec<Issue>> {
        let columns = prefixed_columns("i");
        let sql = format!(
            r#"
            SELECT {columns}
            FROM issues i
            JOIN reported_users ru ON ru.issue_id = i.id
            WHERE ru.user_id = $1
            ORDER BY ru.reported_at DESC
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(handle_db_error)
    }

    async fn list_assigned_to(&self, officer_id: Uuid) -> Result<Vec<Issue>> {
        let sql = format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            WHERE assigned_officer_id = $1
            ORDER BY priority_score DESC, created_at ASC
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(officer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(handle_db_error)
    }

    async fn list_batch(&self, cursor: Option<IssueCursor>, limit: i64) -> Result<Vec<Issue>> {
        let issues = match cursor {
            Some((created_at, id)) => {
                let sql = format!(
                    r#"
                    SELECT {ISSUE_COLUMNS}
                    FROM issues
                    WHERE (created_at, id) > ($1, $2)
                    ORDER BY created_at ASC, id ASC
                    LIMIT $3
                    "#
                );
                sqlx::query_as::<_, Issue>(&sql)
                    .bind(created_at)
                    .bind(id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at ASC, id ASC LIMIT $1"
                );
                sqlx::query_as::<_, Issue>(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };

        issues.map_err(handle_db_error)
    }

    async fn find_officer_by_user(&self, user_id: &str) -> Result<Option<Officer>> {
        sqlx::query_as::<_, Officer>(
            r#"
            SELECT id, user_id, name, department, contact_number, created_at
            FROM officers
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(handle_db_error)
    }

    async fn update_progress(
        &self,
        issue_id: Uuid,
        officer_id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<Option<Issue>> {
        // issue_status enum values compare in declaration order
        let sql = format!(
            r#"
            UPDATE issues
            SET status = $2,
                progress_percentage = $3,
                work_image_ref = COALESCE($4, work_image_ref),
                updated_at = NOW()
            WHERE id = $1
              AND assigned_officer_id = $5
              AND status <= $2
            RETURNING {ISSUE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(issue_id)
            .bind(update.status)
            .bind(update.progress_percentage)
            .bind(update.work_image_ref.as_deref())
            .bind(officer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(handle_db_error)
    }
}

struct PgIssueTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IssueTransaction for PgIssueTransaction {
    async fn insert_issue(&mut self, issue: &CreateIssue) -> Result<Issue> {
        let sql = format!(
            r#"
            INSERT INTO issues (
                id, reporter_id, reporter_name, title, description, location_name,
                latitude, longitude, image_ref, is_urgent, report_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1)
            RETURNING {ISSUE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(Uuid::now_v7())
            .bind(&issue.reporter_id)
            .bind(issue.reporter_name.as_deref())
            .bind(&issue.title)
            .bind(&issue.description)
            .bind(&issue.location_name)
            .bind(issue.latitude)
            .bind(issue.longitude)
            .bind(issue.image_ref.as_deref())
            .bind(issue.is_urgent)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(handle_db_error)
    }

    async fn attribute_report(&mut self, issue_id: Uuid, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reported_users (issue_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (issue_id, user_id) DO NOTHING
            "#,
        )
        .bind(issue_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await
        .map_err(handle_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_report_count(&mut self, issue_id: Uuid, is_urgent: bool) -> Result<Issue> {
        let sql = format!(
            r#"
            UPDATE issues
            SET report_count = report_count + 1,
                is_urgent = is_urgent OR $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(issue_id)
            .bind(is_urgent)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(handle_db_error)
    }

    async fn lock_issue(&mut self, issue_id: Uuid) -> Result<Option<Issue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Issue>(&sql)
            .bind(issue_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(handle_db_error)
    }

    async fn officer_loads(&mut self) -> Result<Vec<OfficerLoad>> {
        sqlx::query_as::<_, OfficerLoad>(
            r#"
            SELECT o.id AS officer_id,
                   COUNT(i.id) AS open_issues,
                   o.created_at
            FROM officers o
            LEFT JOIN issues i
                   ON i.assigned_officer_id = o.id
                  AND i.status <> 'solved'
            GROUP BY o.id, o.created_at
            ORDER BY open_issues ASC, o.created_at ASC, o.id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(handle_db_error)
    }

    async fn apply_priority(&mut self, issue_id: Uuid, update: &PriorityUpdate) -> Result<Issue> {
        let sql = format!(
            r#"
            UPDATE issues
            SET severity = $2,
                priority_score = $3,
                priority = $4,
                assigned_officer_id = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Issue>(&sql)
            .bind(issue_id)
            .bind(update.severity)
            .bind(update.priority_score)
            .bind(update.priority)
            .bind(update.assigned_officer_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(handle_db_error)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(handle_db_error)
    }
}

fn prefixed_columns(alias: &str) -> String {
    ISSUE_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE wildcards so a location name matches literally
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
