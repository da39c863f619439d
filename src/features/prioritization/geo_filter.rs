//! Candidate pre-filter: bounding box around the new report, or a matching
//! location name. The SQL in `PgIssueStore::find_nearby` and
//! [`GeoQuery::matches`] express the same predicate; the duplicate scan
//! uses `matches` directly.

use crate::features::issues::models::Issue;

/// Half-width of the bounding box (degrees) used for live submissions
pub const LIVE_GEO_DELTA: f64 = 0.0002;

/// Wider neighbourhood used by the offline duplicate scan
pub const WIDE_GEO_DELTA: f64 = 0.001;

/// Default cap on candidates passed to the similarity matcher
pub const DEFAULT_MAX_CANDIDATES: i64 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct GeoQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub delta: f64,
    /// Existing issues whose location name contains this (case-insensitive)
    pub location_name: Option<String>,
    pub limit: i64,
}

impl GeoQuery {
    pub fn new(latitude: f64, longitude: f64, delta: f64) -> Self {
        Self {
            latitude,
            longitude,
            delta,
            location_name: None,
            limit: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_location_name(mut self, name: &str) -> Self {
        let trimmed = name.trim();
        self.location_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn lat_bounds(&self) -> (f64, f64) {
        (self.latitude - self.delta, self.latitude + self.delta)
    }

    pub fn lon_bounds(&self) -> (f64, f64) {
        (self.longitude - self.delta, self.longitude + self.delta)
    }

    pub fn within_box(&self, latitude: f64, longitude: f64) -> bool {
        let (lat_min, lat_max) = self.lat_bounds();
        let (lon_min, lon_max) = self.lon_bounds();
        (lat_min..=lat_max).contains(&latitude) && (lon_min..=lon_max).contains(&longitude)
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        let name_hit = self.location_name.as_deref().is_some_and(|name| {
            issue
                .location_name
                .to_lowercase()
                .contains(&name.to_lowercase())
        });
        name_hit || self.within_box(issue.latitude, issue.longitude)
    }

    /// Box hits first, then name-only hits, each by `(created_at, id)`,
    /// then the cap. Mirrors the ordering of `PgIssueStore::find_nearby`.
    #[cfg(test)]
    pub fn select<'a, I>(&self, issues: I) -> Vec<Issue>
    where
        I: IntoIterator<Item = &'a Issue>,
    {
        let mut hits: Vec<Issue> = issues
            .into_iter()
            .filter(|issue| self.matches(issue))
            .cloned()
            .collect();
        hits.sort_by_key(|issue| {
            (
                !self.within_box(issue.latitude, issue.longitude),
                issue.created_at,
                issue.id,
            )
        });
        hits.truncate(self.limit as usize);
        hits
    }
}
