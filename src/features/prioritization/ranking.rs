//! Offline ranking strategies for dashboard analytics.
//!
//! Nothing here writes to `issues.priority_score` or `issues.priority`; the
//! live values come from [`crate::features::prioritization::scoring`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::issues::models::Issue;
use crate::features::prioritization::geo_filter::{GeoQuery, WIDE_GEO_DELTA};
use crate::features::prioritization::model::SeverityModel;
use crate::features::prioritization::scoring::round2;
use crate::features::prioritization::similarity::TfidfSimilarity;
use crate::features::prioritization::text::term_counts;

const CRITICAL_AREAS: [&str; 5] = ["hospital", "school", "junction", "main road", "market"];

const HIGH_KEYWORDS: [&str; 7] = [
    "accident",
    "fire",
    "emergency",
    "water leakage",
    "tree fallen",
    "gas leak",
    "bridge collapse",
];
const MEDIUM_KEYWORDS: [&str; 5] = [
    "pothole",
    "flood",
    "broken road",
    "open manhole",
    "streetlight failure",
];
const LOW_KEYWORDS: [&str; 5] = [
    "garbage",
    "noise",
    "graffiti",
    "stray animals",
    "general complaints",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategyKind {
    #[default]
    WeightedBlend,
    KeywordSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RankedIssue {
    pub issue_id: Uuid,
    pub title: String,
    pub location_name: String,
    /// Strategy-specific severity (model class 0-2, or keyword scale 1-5)
    pub severity: i64,
    pub score: f64,
    /// Only the keyword strategy assigns a tier
    pub tier: Option<i16>,
}

pub trait RankingStrategy: Send + Sync {
    fn kind(&self) -> RankingStrategyKind;

    /// Issues ordered by score descending; ties keep input order
    fn rank(&self, issues: &[Issue]) -> Result<Vec<RankedIssue>>;
}

fn sort_desc(mut ranked: Vec<RankedIssue>) -> Vec<RankedIssue> {
    // sort_by is stable
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// `0.6 * model_severity + 0.3 * repeated_reports + 0.1 * location_weight`
pub struct WeightedBlendRanking {
    model: Arc<dyn SeverityModel>,
}

impl WeightedBlendRanking {
    pub fn new(model: Arc<dyn SeverityModel>) -> Self {
        Self { model }
    }

    pub fn location_weight(location_name: &str) -> f64 {
        let lowered = location_name.to_lowercase();
        if CRITICAL_AREAS.iter().any(|area| lowered.contains(area)) {
            1.5
        } else {
            1.0
        }
    }
}

impl RankingStrategy for WeightedBlendRanking {
    fn kind(&self) -> RankingStrategyKind {
        RankingStrategyKind::WeightedBlend
    }

    fn rank(&self, issues: &[Issue]) -> Result<Vec<RankedIssue>> {
        // Issues at the exact same coordinates count as repeated reports
        let mut area_counts: HashMap<(u64, u64), usize> = HashMap::new();
        for issue in issues {
            *area_counts
                .entry((issue.latitude.to_bits(), issue.longitude.to_bits()))
                .or_insert(0) += 1;
        }

        let mut ranked = Vec::with_capacity(issues.len());
        for issue in issues {
            let features = self.model.vectorize(&issue.description)?;
            let severity = self.model.predict(&features)?;
            let repeated =
                area_counts[&(issue.latitude.to_bits(), issue.longitude.to_bits())] as f64;
            let score = 0.6 * severity as f64
                + 0.3 * repeated
                + 0.1 * Self::location_weight(&issue.location_name);

            ranked.push(RankedIssue {
                issue_id: issue.id,
                title: issue.title.clone(),
                location_name: issue.location_name.clone(),
                severity,
                score: round2(score),
                tier: None,
            });
        }

        Ok(sort_desc(ranked))
    }
}

/// Keyword severity on a 1-5 scale, damped by report count
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSeverityRanking;

impl KeywordSeverityRanking {
    pub fn keyword_severity(description: &str) -> i64 {
        let lowered = description.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        if words.is_empty() {
            return 2;
        }
        let word_set: HashSet<&str> = words.iter().copied().collect();
        let phrase = words.join(" ");

        let hit = |keywords: &[&str]| {
            keywords.iter().any(|kw| {
                if kw.contains(' ') {
                    phrase.contains(kw)
                } else {
                    word_set.contains(kw)
                }
            })
        };

        if hit(&HIGH_KEYWORDS) {
            4
        } else if hit(&MEDIUM_KEYWORDS) {
            3
        } else if hit(&LOW_KEYWORDS) {
            1
        } else {
            2
        }
    }

    pub fn score(severity: i64, report_count: i64) -> f64 {
        if severity == 1 {
            return 1.0;
        }
        0.7 * severity as f64 + 0.3 * (report_count as f64).ln_1p()
    }

    pub fn tier(score: f64) -> i16 {
        if score > 4.0 {
            3
        } else if score > 2.5 {
            2
        } else {
            1
        }
    }
}

impl RankingStrategy for KeywordSeverityRanking {
    fn kind(&self) -> RankingStrategyKind {
        RankingStrategyKind::KeywordSeverity
    }

    fn rank(&self, issues: &[Issue]) -> Result<Vec<RankedIssue>> {
        let ranked = issues
            .iter()
            .map(|issue| {
                let severity = Self::keyword_severity(&issue.description);
                let score = Self::score(severity, issue.report_count as i64);
                RankedIssue {
                    issue_id: issue.id,
                    title: issue.title.clone(),
                    location_name: issue.location_name.clone(),
                    severity,
                    score: round2(score),
                    tier: Some(Self::tier(score)),
                }
            })
            .collect();
        Ok(sort_desc(ranked))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DuplicatePair {
    pub earlier_id: Uuid,
    pub later_id: Uuid,
    pub score: f64,
}

/// For each issue, its best earlier TF-IDF match at or above `threshold`.
/// Issues are scanned in `(created_at, id)` order and only compared with
/// earlier issues inside the wide box or sharing the location name.
///
/// CPU-bound; async callers run it on the blocking pool.
pub fn find_duplicate_pairs(issues: &[Issue], threshold: f64) -> Vec<DuplicatePair> {
    let mut ordered: Vec<&Issue> = issues.iter().collect();
    ordered.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    // each description is tokenized once
    let counts: Vec<HashMap<String, usize>> = ordered
        .iter()
        .map(|issue| term_counts(&issue.description))
        .collect();

    let mut pairs = Vec::new();
    for (i, later) in ordered.iter().enumerate().skip(1) {
        if counts[i].is_empty() {
            continue;
        }
        let neighbourhood = GeoQuery::new(later.latitude, later.longitude, WIDE_GEO_DELTA)
            .with_location_name(&later.location_name);
        let earlier: Vec<usize> = (0..i)
            .filter(|&j| neighbourhood.matches(ordered[j]))
            .collect();
        if earlier.is_empty() {
            continue;
        }

        let candidate_counts: Vec<&HashMap<String, usize>> =
            earlier.iter().map(|&j| &counts[j]).collect();
        let scores = TfidfSimilarity::score_counts(&counts[i], &candidate_counts);

        // first maximum wins ties
        let mut best: Option<(usize, f64)> = None;
        for (&j, score) in earlier.iter().zip(scores) {
            match best {
                Some((_, b)) if score <= b => {}
                _ => best = Some((j, score)),
            }
        }

        if let Some((j, score)) = best.filter(|(_, score)| *score >= threshold) {
            pairs.push(DuplicatePair {
                earlier_id: ordered[j].id,
                later_id: later.id,
                score: round2(score),
            });
        }
    }

    tracing::debug!(
        scanned = ordered.len(),
        pairs = pairs.len(),
        "Duplicate scan finished"
    );
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::prioritization::similarity::BATCH_DUPLICATE_THRESHOLD;
    use crate::shared::test_helpers::{sample_issue, FixedSeverityModel};

    #[test]
    fn test_keyword_severity_scale() {
        assert_eq!(KeywordSeverityRanking::keyword_severity("Fire near the depot"), 4);
        assert_eq!(KeywordSeverityRanking::keyword_severity("Huge POTHOLE here"), 3);
        assert_eq!(KeywordSeverityRanking::keyword_severity("garbage everywhere"), 1);
        assert_eq!(KeywordSeverityRanking::keyword_severity("bench is wobbly"), 2);
        assert_eq!(KeywordSeverityRanking::keyword_severity(""), 2);
        assert_eq!(
            KeywordSeverityRanking::keyword_severity("an open  manhole on 3rd street"),
            3
        );
    }

    #[test]
    fn test_keyword_score_and_tier() {
        assert_eq!(KeywordSeverityRanking::score(1, 50), 1.0);
        // 0.7*4 + 0.3*ln(1+20) = 3.71
        let s = KeywordSeverityRanking::score(4, 20);
        assert_eq!(round2(s), 3.71);
        assert_eq!(KeywordSeverityRanking::tier(s), 2);
        assert_eq!(KeywordSeverityRanking::tier(4.01), 3);
        assert_eq!(KeywordSeverityRanking::tier(4.0), 2);
        assert_eq!(KeywordSeverityRanking::tier(2.5), 1);
    }

    #[test]
    fn test_keyword_ranking_orders_descending_and_keeps_ties() {
        let issues = vec![
            sample_issue("garbage dump"),
            sample_issue("bench broken"),
            sample_issue("fire in shop"),
            sample_issue("door broken"),
        ];
        let ranked = KeywordSeverityRanking.rank(&issues).unwrap();
        let order: Vec<Uuid> = ranked.iter().map(|r| r.issue_id).collect();
        assert_eq!(order, vec![issues[2].id, issues[1].id, issues[3].id, issues[0].id]);
        assert_eq!(ranked[0].tier, Some(2));
    }

    #[test]
    fn test_weighted_blend_counts_repeats_and_critical_areas() {
        let mut a = sample_issue("pothole");
        a.latitude = 1.0;
        a.longitude = 1.0;
        a.location_name = "City Hospital".to_string();
        let mut b = sample_issue("pothole again");
        b.latitude = 1.0;
        b.longitude = 1.0;
        let mut c = sample_issue("other");
        c.latitude = 2.0;
        c.longitude = 2.0;

        let strategy = WeightedBlendRanking::new(Arc::new(FixedSeverityModel::new(1)));
        let ranked = strategy.rank(&[c.clone(), b.clone(), a.clone()]).unwrap();

        // a: 0.6 + 0.6 + 0.15; b: 0.6 + 0.6 + 0.1; c: 0.6 + 0.3 + 0.1
        assert_eq!(ranked[0].issue_id, a.id);
        assert_eq!(ranked[0].score, 1.35);
        assert_eq!(ranked[1].issue_id, b.id);
        assert_eq!(ranked[1].score, 1.3);
        assert_eq!(ranked[2].issue_id, c.id);
        assert_eq!(ranked[2].score, 1.0);
        assert!(ranked.iter().all(|r| r.tier.is_none()));
    }

    #[test]
    fn test_duplicate_pairs_point_back_to_earlier_issue() {
        let now = chrono::Utc::now();
        let mut first = sample_issue("Streetlight not working near park gate");
        first.created_at = now - chrono::Duration::hours(2);
        let mut other = sample_issue("Garbage overflowing at bus stand");
        other.created_at = now - chrono::Duration::hours(1);
        let mut repeat = sample_issue("streetlight not working near park gate!");
        repeat.created_at = now;

        let pairs = find_duplicate_pairs(
            &[repeat.clone(), other, first.clone()],
            BATCH_DUPLICATE_THRESHOLD,
        );

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].earlier_id, first.id);
        assert_eq!(pairs[0].later_id, repeat.id);
        assert_eq!(pairs[0].score, 1.0);
    }

    #[test]
    fn test_identical_text_in_other_neighbourhoods_is_not_paired() {
        let now = chrono::Utc::now();
        let mut first = sample_issue("Overflowing drain near the temple");
        first.created_at = now - chrono::Duration::hours(1);
        let mut elsewhere = sample_issue("Overflowing drain near the temple");
        elsewhere.latitude = first.latitude + 0.01;
        elsewhere.location_name = "Koramangala 5th Block".to_string();
        elsewhere.created_at = now;

        let pairs = find_duplicate_pairs(&[first.clone(), elsewhere.clone()], 0.8);
        assert!(pairs.is_empty());

        // same name, outside the box
        elsewhere.location_name = first.location_name.clone();
        let pairs = find_duplicate_pairs(&[first.clone(), elsewhere.clone()], 0.8);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].earlier_id, first.id);
    }

    #[test]
    fn test_blank_descriptions_are_never_paired() {
        let now = chrono::Utc::now();
        let mut first = sample_issue("   ");
        first.created_at = now - chrono::Duration::minutes(5);
        let mut second = sample_issue("   ");
        second.created_at = now;
        assert!(find_duplicate_pairs(&[first, second], 0.0).is_empty());
    }
}
