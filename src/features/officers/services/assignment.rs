//! Officer selection for high-tier issues.

use uuid::Uuid;

use crate::features::officers::models::OfficerLoad;
use crate::features::prioritization::PriorityTier;

/// Least open issues first, then earliest `created_at`, then lowest id
pub fn select_least_loaded(loads: &[OfficerLoad]) -> Option<Uuid> {
    loads
        .iter()
        .min_by(|a, b| {
            (a.open_issues, a.created_at, a.officer_id).cmp(&(
                b.open_issues,
                b.created_at,
                b.officer_id,
            ))
        })
        .map(|load| load.officer_id)
}

/// New officer for the issue, if one is needed. Only unassigned tier-3
/// issues get one; callers keep any existing assignment as is.
pub fn assign_if_needed(
    tier: PriorityTier,
    current: Option<Uuid>,
    loads: &[OfficerLoad],
) -> Option<Uuid> {
    if current.is_some() || tier != PriorityTier::High {
        return None;
    }
    let chosen = select_least_loaded(loads);
    match chosen {
        Some(officer_id) => tracing::info!(officer_id = %officer_id, "Assigning officer"),
        None => tracing::warn!("High-priority issue left unassigned: no officers available"),
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn load(open_issues: i64, age_days: i64) -> OfficerLoad {
        OfficerLoad {
            officer_id: Uuid::new_v4(),
            open_issues,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_picks_least_loaded() {
        let loads = vec![load(3, 10), load(1, 1), load(2, 30)];
        assert_eq!(select_least_loaded(&loads), Some(loads[1].officer_id));
    }

    #[test]
    fn test_ties_go_to_longest_serving() {
        let loads = vec![load(0, 1), load(0, 5), load(4, 50)];
        assert_eq!(select_least_loaded(&loads), Some(loads[1].officer_id));
    }

    #[test]
    fn test_full_tie_breaks_on_id() {
        let created_at = Utc::now();
        let mut ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        ids.sort();
        let loads = vec![
            OfficerLoad {
                officer_id: ids[1],
                open_issues: 0,
                created_at,
            },
            OfficerLoad {
                officer_id: ids[0],
                open_issues: 0,
                created_at,
            },
        ];
        assert_eq!(select_least_loaded(&loads), Some(ids[0]));
    }

    #[test]
    fn test_only_high_tier_is_assigned() {
        let loads = vec![load(0, 1)];
        assert_eq!(assign_if_needed(PriorityTier::Medium, None, &loads), None);
        assert_eq!(assign_if_needed(PriorityTier::Low, None, &loads), None);
        assert_eq!(
            assign_if_needed(PriorityTier::High, None, &loads),
            Some(loads[0].officer_id)
        );
    }

    #[test]
    fn test_existing_assignment_is_not_replaced() {
        let existing = Uuid::new_v4();
        let loads = vec![load(0, 1)];
        for tier in [PriorityTier::Low, PriorityTier::High] {
            assert_eq!(assign_if_needed(tier, Some(existing), &loads), None);
        }
    }

    #[test]
    fn test_no_officers_leaves_unassigned() {
        assert_eq!(assign_if_needed(PriorityTier::High, None, &[]), None);
    }
}
