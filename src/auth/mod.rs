//! Authentication for the report API
//!
//! `AuthContext` is the explicit caller identity handed to the report
//! service. `JwtAuth` produces one from a bearer token.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error_handling::ReportError;
use crate::handlers::AppState;
use crate::security::Claims;

/// Identity and permissions of the caller for one request
pub trait AuthContext: Send + Sync {
    fn user_id(&self) -> &str;

    /// Whether the caller holds the named capability
    fn has_capability(&self, capability: &str) -> bool;
}

/// JWT authentication extractor
///
/// Expects `Authorization: Bearer <token>` and validates it with the
/// `SecurityService` held in application state.
#[derive(Debug, Clone)]
pub struct JwtAuth {
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for JwtAuth {
    type Rejection = ReportError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.security_service.validate_request(&parts.headers) {
            Ok(claims) => {
                tracing::debug!("JWT token validated for user: {}", claims.sub);
                Ok(JwtAuth { claims })
            }
            Err(e) => {
                tracing::debug!("JWT token validation failed: {:#}", e);
                Err(ReportError::Authentication {
                    message: e.to_string(),
                })
            }
        }
    }
}
