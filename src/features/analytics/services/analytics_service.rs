use std::sync::Arc;

use crate::core::error::{AppError, Result};
use crate::features::issues::models::Issue;
use crate::features::issues::services::IssueStore;
use crate::features::prioritization::{
    find_duplicate_pairs, DuplicatePair, KeywordSeverityRanking, RankedIssue, RankingStrategy,
    RankingStrategyKind, SeverityModel, WeightedBlendRanking, BATCH_DUPLICATE_THRESHOLD,
};

/// Issues loaded per page when scanning the whole table
const SCAN_BATCH_SIZE: i64 = 500;

/// Service for offline dashboard analytics. Read-only.
pub struct AnalyticsService {
    store: Arc<dyn IssueStore>,
    weighted_blend: WeightedBlendRanking,
    keyword_severity: KeywordSeverityRanking,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn IssueStore>, model: Arc<dyn SeverityModel>) -> Self {
        Self {
            store,
            weighted_blend: WeightedBlendRanking::new(model),
            keyword_severity: KeywordSeverityRanking,
        }
    }

    async fn all_issues(&self) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut cursor = None;
        loop {
            let batch = self.store.list_batch(cursor, SCAN_BATCH_SIZE).await?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some((last.created_at, last.id));
            let done = (batch.len() as i64) < SCAN_BATCH_SIZE;
            issues.extend(batch);
            if done {
                break;
            }
        }
        Ok(issues)
    }

    pub async fn rank(&self, kind: RankingStrategyKind) -> Result<Vec<RankedIssue>> {
        let issues = self.all_issues().await?;
        let strategy: &dyn RankingStrategy = match kind {
            RankingStrategyKind::WeightedBlend => &self.weighted_blend,
            RankingStrategyKind::KeywordSeverity => &self.keyword_severity,
        };
        tracing::debug!(strategy = ?strategy.kind(), issues = issues.len(), "Ranking issues");
        strategy.rank(&issues)
    }

    pub async fn duplicates(&self) -> Result<Vec<DuplicatePair>> {
        let issues = self.all_issues().await?;
        tokio::task::spawn_blocking(move || {
            find_duplicate_pairs(&issues, BATCH_DUPLICATE_THRESHOLD)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Duplicate scan failed: {}", e)))
    }
}
