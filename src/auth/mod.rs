use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::types::{Identity, UserId};

/// Claims carried by bearer tokens. Tokens are issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id as a string
    pub sub: String,
    #[serde(default)]
    pub is_admin: bool,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid subject claim: {0}")]
    InvalidSubject(String),
}

/// What the bearer-token middleware needs to verify a token
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

impl AuthSettings {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            secret: security.jwt_secret.clone(),
            issuer: security.jwt_issuer.clone(),
            audience: security.jwt_audience.clone(),
        }
    }

    /// Verify an HS256 token and turn its claims into the caller identity
    pub fn identity_from_token(&self, token: &str) -> Result<Identity, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?;
        let user_id: UserId = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidSubject(data.claims.sub.clone()))?;

        Ok(Identity { user_id, is_admin: data.claims.is_admin })
    }
}
