use super::model::AuthenticatedUser;
use crate::core::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::Duration;

/// Validates HS256 bearer tokens minted by the identity provider
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

impl JwtValidator {
    pub fn new(secret: &str, issuer: &str, audience: &str, leeway: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = leeway.as_secs();
        validation.validate_nbf = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(e.to_string()))?;

        let claims = token_data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AppError::Auth("Token has an empty subject".to_string()));
        }

        Ok(AuthenticatedUser {
            sub: claims.sub,
            name: claims.name,
            roles: claims.roles,
        })
    }
}
