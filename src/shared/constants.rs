/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Number of issues on the trending board
pub const TRENDING_LIMIT: i64 = 10;

// =============================================================================
// ROLE CONSTANTS
// =============================================================================

pub const ROLE_SUPER_ADMIN: &str = "super_admin";

/// Authority role - city-wide dashboards, rankings and analytics
pub const ROLE_AUTHORITY: &str = "authority";

/// Officer role - works on assigned issues
pub const ROLE_OFFICER: &str = "officer";

/// Citizen role - reports issues and tracks their reports
pub const ROLE_CITIZEN: &str = "citizen";
