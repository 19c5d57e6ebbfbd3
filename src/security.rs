//! Security module for JWT validation and capability checks
//! Tokens carry the caller's identity and the capabilities it holds

use crate::auth::AuthContext;
use crate::config::Config;
use anyhow::{Context, Result};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Role that implicitly holds every capability
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// User roles
    #[serde(default)]
    pub roles: Vec<String>,

    /// Capabilities granted to the user, e.g. `moodle/user:viewdetails`
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp (absent for permanent tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    pub iss: String,
    pub aud: String,
    pub jti: String,
}

impl AuthContext for Claims {
    fn user_id(&self) -> &str {
        &self.sub
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE) || self.capabilities.iter().any(|c| c == capability)
    }
}

/// Security service for authentication
pub struct SecurityService {
    config: Arc<Config>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SecurityService {
    /// Create a new security service
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let secret = config.security.jwt_secret.as_bytes();

        if secret.len() < 32 {
            return Err(anyhow::anyhow!("JWT secret must be at least 32 characters long"));
        }

        let encoding_key = EncodingKey::from_secret(secret);
        let decoding_key = DecodingKey::from_secret(secret);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.security.audience.as_str()]);
        validation.set_issuer(&[config.security.issuer.as_str()]);
        // exp is checked when present; permanent tokens omit it
        validation.validate_nbf = false;
        validation.required_spec_claims.remove("exp");

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Validate incoming request headers and extract claims
    pub fn validate_request(&self, headers: &HeaderMap) -> Result<Claims> {
        let token = self
            .extract_token(headers)
            .context("Missing or invalid Authorization header")?;

        let claims = self.decode_token(&token).context("Invalid JWT token")?;

        debug!("Request validated for user: {}", claims.sub);
        Ok(claims)
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        user_id: &str,
        roles: Vec<String>,
        capabilities: Vec<String>,
    ) -> Result<String> {
        let now = Utc::now();

        let exp = if self.config.security.token_expiration_secs > 0 {
            Some((now + Duration::seconds(self.config.security.token_expiration_secs as i64)).timestamp())
        } else {
            None
        };

        let claims = Claims {
            sub: user_id.to_string(),
            name: None,
            roles,
            capabilities,
            iat: now.timestamp(),
            exp,
            iss: self.config.security.issuer.clone(),
            aud: self.config.security.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")
    }

    /// Extract the bearer token from the Authorization header
    pub fn extract_token(&self, headers: &HeaderMap) -> Result<String> {
        let auth_header = headers
            .get("authorization")
            .ok_or_else(|| anyhow::anyhow!("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .context("Invalid Authorization header format")?;

        auth_str
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Authorization header must start with 'Bearer '"))
    }

    /// Decode and validate JWT token
    pub fn decode_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("JWT decode error: {:?}", e);
                anyhow::anyhow!("Failed to decode JWT token: {}", e)
            })?;

        Ok(token_data.claims)
    }
}
