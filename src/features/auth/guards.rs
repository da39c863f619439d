//! Role-based authorization guards.
//!
//! - super_admin can do everything
//! - authority sees city-wide rankings and analytics
//! - officer works on assigned issues
//! - citizen reports issues and tracks their own reports

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use axum::{extract::FromRequestParts, http::request::Parts};

fn authenticated(parts: &Parts) -> Result<&AuthenticatedUser, AppError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))
}

/// Allows "super_admin" and "authority"
pub struct RequireAuthority(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuthority
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.has_authority_access() {
            return Err(AppError::Forbidden("Authority access required".to_string()));
        }
        Ok(RequireAuthority(user.clone()))
    }
}

/// Allows "super_admin" and "officer"
pub struct RequireOfficer(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireOfficer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.has_officer_access() {
            return Err(AppError::Forbidden("Officer access required".to_string()));
        }
        Ok(RequireOfficer(user.clone()))
    }
}

/// Allows any known role
pub struct RequireCitizen(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireCitizen
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.has_citizen_access() {
            return Err(AppError::Forbidden("Citizen access required".to_string()));
        }
        Ok(RequireCitizen(user.clone()))
    }
}
