use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::core::config::PrioritizationConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::{ReportOutcomeKind, SubmitReportDto};
use crate::features::issues::models::{CreateIssue, Issue, PriorityUpdate};
use crate::features::issues::services::issue_store::{IssueStore, IssueTransaction};
use crate::features::officers::services::assignment::assign_if_needed;
use crate::features::prioritization::{
    GeoQuery, PriorityAssessment, PriorityScorer, PriorityTier, SeverityClassifier,
    SimilarityMatcher,
};
use crate::shared::validation::describe_errors;

const DEFAULT_TITLE: &str = "Untitled Issue";

/// Issues rescored per page during a full recompute
const RECOMPUTE_BATCH_SIZE: i64 = 100;

/// Tunables for the submission pipeline
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub geo_delta: f64,
    pub geo_match_location_name: bool,
    pub max_candidates: i64,
    pub storage_max_retries: u32,
    pub recompute_on_read: bool,
}

impl From<&PrioritizationConfig> for ReportSettings {
    fn from(config: &PrioritizationConfig) -> Self {
        Self {
            geo_delta: config.geo_delta,
            geo_match_location_name: config.geo_match_location_name,
            max_candidates: config.max_candidates,
            storage_max_retries: config.storage_max_retries,
            recompute_on_read: config.recompute_on_read,
        }
    }
}

/// Result of a submission; the issue reflects the committed state
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub kind: ReportOutcomeKind,
    pub issue: Issue,
}

/// Service for report submission, deduplication and prioritization
pub struct ReportService {
    store: Arc<dyn IssueStore>,
    classifier: SeverityClassifier,
    scorer: PriorityScorer,
    matcher: SimilarityMatcher,
    settings: ReportSettings,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn IssueStore>,
        classifier: SeverityClassifier,
        matcher: SimilarityMatcher,
        settings: ReportSettings,
    ) -> Self {
        if settings.recompute_on_read {
            tracing::warn!(
                "PRIORITY_RECOMPUTE_ON_READ is enabled: every dashboard read rescans all issues"
            );
        }
        Self {
            store,
            classifier,
            scorer: PriorityScorer,
            matcher,
            settings,
        }
    }

    /// Submit a citizen report. It either creates a new issue, merges into a
    /// similar nearby issue, or is a no-op when the user already reported it.
    pub async fn submit_report(
        &self,
        user: &AuthenticatedUser,
        dto: &SubmitReportDto,
    ) -> Result<ReportOutcome> {
        dto.validate()
            .map_err(|e| AppError::Validation(describe_errors(&e)))?;

        self.with_retries("submit_report", || self.try_submit(user, dto))
            .await
    }

    async fn try_submit(
        &self,
        user: &AuthenticatedUser,
        dto: &SubmitReportDto,
    ) -> Result<ReportOutcome> {
        let description = dto.description.trim();
        let location_name = dto.location_name.trim();

        let mut query = GeoQuery::new(dto.latitude, dto.longitude, self.settings.geo_delta)
            .with_limit(self.settings.max_candidates);
        if self.settings.geo_match_location_name {
            query = query.with_location_name(location_name);
        }
        let nearby = self.store.find_nearby(&query).await?;

        let candidates: Vec<(Uuid, &str)> = nearby
            .iter()
            .map(|issue| (issue.id, issue.description.as_str()))
            .collect();
        let best = self.matcher.find_best_match(description, &candidates).await?;

        tracing::debug!(
            candidates = candidates.len(),
            threshold = self.matcher.threshold(),
            matched = best.is_some(),
            "Similarity check finished"
        );

        match best {
            Some(found) => {
                let existing = nearby
                    .into_iter()
                    .find(|issue| issue.id == found.issue_id)
                    .ok_or_else(|| {
                        AppError::Internal(format!("Matched issue {} vanished", found.issue_id))
                    })?;
                self.merge_into(user, existing, dto.is_urgent, found.score)
                    .await
            }
            None => {
                // A row with the same text at the same point is the same issue
                // even when it fell outside the candidate set
                let exact = self
                    .store
                    .find_exact(description, dto.latitude, dto.longitude)
                    .await?;
                match exact {
                    Some(existing) => self.merge_into(user, existing, dto.is_urgent, 1.0).await,
                    None => self.create_issue(user, dto).await,
                }
            }
        }
    }

    async fn merge_into(
        &self,
        user: &AuthenticatedUser,
        existing: Issue,
        is_urgent: bool,
        score: f64,
    ) -> Result<ReportOutcome> {
        if self.store.has_reported(existing.id, &user.sub).await? {
            tracing::info!(issue_id = %existing.id, user = %user.sub, "Duplicate report ignored");
            return Ok(ReportOutcome {
                kind: ReportOutcomeKind::AlreadyReported,
                issue: existing,
            });
        }

        let mut tx = self.store.begin().await?;
        if !tx.attribute_report(existing.id, &user.sub).await? {
            // A concurrent request from the same user won; tx rolls back on drop
            tracing::info!(issue_id = %existing.id, user = %user.sub, "Duplicate report ignored");
            return Ok(ReportOutcome {
                kind: ReportOutcomeKind::AlreadyReported,
                issue: existing,
            });
        }

        let issue = tx.increment_report_count(existing.id, is_urgent).await?;
        let issue = self.score_and_assign(tx.as_mut(), issue).await?;
        tx.commit().await?;

        tracing::info!(
            issue_id = %issue.id,
            similarity = score,
            report_count = issue.report_count,
            priority = issue.priority,
            "Report merged into existing issue"
        );

        Ok(ReportOutcome {
            kind: ReportOutcomeKind::Merged,
            issue,
        })
    }

    async fn create_issue(
        &self,
        user: &AuthenticatedUser,
        dto: &SubmitReportDto,
    ) -> Result<ReportOutcome> {
        let title = dto
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);

        let create = CreateIssue {
            reporter_id: user.sub.clone(),
            reporter_name: user.name.clone(),
            title: title.to_string(),
            description: dto.description.trim().to_string(),
            location_name: dto.location_name.trim().to_string(),
            latitude: dto.latitude,
            longitude: dto.longitude,
            image_ref: dto.image_ref.clone(),
            is_urgent: dto.is_urgent,
        };

        let mut tx = self.store.begin().await?;
        let issue = tx.insert_issue(&create).await?;
        tx.attribute_report(issue.id, &user.sub).await?;
        let issue = self.score_and_assign(tx.as_mut(), issue).await?;
        tx.commit().await?;

        tracing::info!(
            issue_id = %issue.id,
            severity = issue.severity,
            priority = issue.priority,
            assigned_officer_id = ?issue.assigned_officer_id,
            "New issue created"
        );

        Ok(ReportOutcome {
            kind: ReportOutcomeKind::Created,
            issue,
        })
    }

    /// Severity and score for an issue as it stands
    pub fn assess(&self, issue: &Issue) -> Result<PriorityAssessment> {
        let severity = self
            .classifier
            .classify(&issue.description, issue.is_urgent)?;
        self.scorer
            .score(severity, issue.report_count as i64, &issue.location_name)
    }

    async fn priority_update(
        &self,
        tx: &mut dyn IssueTransaction,
        issue: &Issue,
    ) -> Result<PriorityUpdate> {
        let assessment = self.assess(issue)?;

        let new_officer =
            if assessment.tier == PriorityTier::High && issue.assigned_officer_id.is_none() {
                let loads = tx.officer_loads().await?;
                assign_if_needed(assessment.tier, issue.assigned_officer_id, &loads)
            } else {
                None
            };

        Ok(PriorityUpdate {
            severity: assessment.severity.as_i16(),
            priority_score: assessment.score,
            priority: assessment.tier.as_i16(),
            assigned_officer_id: issue.assigned_officer_id.or(new_officer),
        })
    }

    async fn score_and_assign(&self, tx: &mut dyn IssueTransaction, issue: Issue) -> Result<Issue> {
        let update = self.priority_update(tx, &issue).await?;
        tx.apply_priority(issue.id, &update).await
    }

    /// Rescore every issue, writing only rows whose priority fields change.
    /// Returns the number of rows written.
    pub async fn recompute_all_priorities(&self) -> Result<u64> {
        let mut updated = 0u64;
        let mut scanned = 0usize;
        let mut cursor = None;

        loop {
            let batch = self
                .store
                .list_batch(cursor, RECOMPUTE_BATCH_SIZE)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some((last.created_at, last.id));
            scanned += batch.len();

            for issue in &batch {
                if !self.needs_rescore(issue)? {
                    continue;
                }
                let written = self
                    .with_retries("recompute_priority", || self.rescore_one(issue.id))
                    .await?;
                if written {
                    updated += 1;
                }
            }

            if (batch.len() as i64) < RECOMPUTE_BATCH_SIZE {
                break;
            }
        }

        tracing::info!(scanned, updated, "Priority recompute finished");
        Ok(updated)
    }

    fn needs_rescore(&self, issue: &Issue) -> Result<bool> {
        let a = self.assess(issue)?;
        Ok(a.severity.as_i16() != issue.severity
            || a.score != issue.priority_score
            || a.tier.as_i16() != issue.priority
            || (a.tier == PriorityTier::High && issue.assigned_officer_id.is_none()))
    }

    async fn rescore_one(&self, issue_id: Uuid) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let Some(issue) = tx.lock_issue(issue_id).await? else {
            return Ok(false);
        };

        let update = self.priority_update(tx.as_mut(), &issue).await?;
        if !update.differs_from(&issue) {
            return Ok(false);
        }

        tx.apply_priority(issue_id, &update).await?;
        tx.commit().await?;
        tracing::debug!(issue_id = %issue_id, priority = update.priority, "Issue rescored");
        Ok(true)
    }

    /// Opt-in eager refresh before list views
    pub async fn refresh_before_read(&self) -> Result<()> {
        if self.settings.recompute_on_read {
            self.recompute_all_priorities().await?;
        }
        Ok(())
    }

    /// Issues ordered by live priority, with total count
    pub async fn get_priority_ranking(&self, offset: i64, limit: i64) -> Result<(Vec<Issue>, i64)> {
        self.refresh_before_read().await?;
        self.store.list_ranked(offset, limit).await
    }

    pub async fn list_trending(&self, limit: i64) -> Result<Vec<Issue>> {
        self.refresh_before_read().await?;
        self.store.list_trending(limit).await
    }

    /// Issues the user has reported, including ones merged into
    pub async fn list_by_reporter(&self, user_id: &str) -> Result<Vec<Issue>> {
        self.store.list_reported_by(user_id).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Issue> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
    }

    async fn with_retries<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.settings.storage_max_retries.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        "Storage conflict, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
