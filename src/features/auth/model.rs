use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::constants::{ROLE_AUTHORITY, ROLE_CITIZEN, ROLE_OFFICER, ROLE_SUPER_ADMIN};

/// Identity supplied by the external identity provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Stable subject identifier, used as the reporter id
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(ROLE_SUPER_ADMIN)
    }

    /// Authorities see the city-wide dashboards and trigger recomputation
    pub fn has_authority_access(&self) -> bool {
        self.is_super_admin() || self.has_role(ROLE_AUTHORITY)
    }

    pub fn has_officer_access(&self) -> bool {
        self.is_super_admin() || self.has_role(ROLE_OFFICER)
    }

    /// Any known role may submit reports
    pub fn has_citizen_access(&self) -> bool {
        self.has_authority_access() || self.has_officer_access() || self.has_role(ROLE_CITIZEN)
    }
}
