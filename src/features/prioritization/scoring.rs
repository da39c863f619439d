//! Live priority scorer. This is the authoritative formula behind
//! `issues.priority_score` / `issues.priority` and officer assignment.
//! Dashboard analytics use the separate strategies in `ranking`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};
use crate::features::prioritization::severity::SeverityClass;

/// Weight of the severity class in the live score
pub const SEVERITY_WEIGHT: f64 = 1.5;

/// Score at or above which a non-High issue is promoted to the Medium tier
pub const MEDIUM_TIER_THRESHOLD: f64 = 4.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    pub fn as_i16(self) -> i16 {
        match self {
            PriorityTier::Low => 1,
            PriorityTier::Medium => 2,
            PriorityTier::High => 3,
        }
    }
}

impl TryFrom<i16> for PriorityTier {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            1 => Ok(PriorityTier::Low),
            2 => Ok(PriorityTier::Medium),
            3 => Ok(PriorityTier::High),
            other => Err(AppError::Validation(format!(
                "priority must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

/// Severity, score and tier computed together and persisted together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityAssessment {
    pub severity: SeverityClass,
    pub score: f64,
    pub tier: PriorityTier,
}

/// `score = 1.5 * severity + ln(report_count + 1)`, rounded to 2 decimals.
///
/// The log term lets recurrence break ties between same-severity issues
/// without letting a pile of duplicate reports outrank one High issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    /// `location_name` is accepted for parity with the batch scorers and does
    /// not affect the live score.
    pub fn score(
        &self,
        severity: SeverityClass,
        report_count: i64,
        _location_name: &str,
    ) -> Result<PriorityAssessment> {
        if report_count < 0 {
            return Err(AppError::Validation(format!(
                "report_count must not be negative, got {}",
                report_count
            )));
        }

        let raw = SEVERITY_WEIGHT * severity.as_i16() as f64 + ((report_count + 1) as f64).ln();
        let score = round2(raw);

        let tier = if severity == SeverityClass::High {
            PriorityTier::High
        } else if score >= MEDIUM_TIER_THRESHOLD {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        };

        Ok(PriorityAssessment {
            severity,
            score,
            tier,
        })
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
