//! Optional bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued elsewhere; this server only validates them.
//! A request without an `Authorization` header is a guest.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use common::UserId;
use domain::{Email, Identity, Owner};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Role granting access to inventory administration.
pub const ADMIN_ROLE: &str = "admin";

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub exp: usize,
    #[serde(default)]
    pub role: Option<String>,
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Guest,
    User {
        identity: Identity,
        role: Option<String>,
    },
}

impl Caller {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Caller::Guest => None,
            Caller::User { identity, .. } => Some(identity.clone()),
        }
    }

    /// Fails unless the caller holds the admin role.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self {
            Caller::Guest => Err(ApiError::Unauthorized(
                "Authentication required".to_string(),
            )),
            Caller::User { role, .. } if role.as_deref() == Some(ADMIN_ROLE) => Ok(()),
            Caller::User { .. } => Err(ApiError::Forbidden("Admin role required".to_string())),
        }
    }

    /// Fails unless the caller may read or act on an order owned by `owner`.
    ///
    /// A user's order needs that user's token or an admin's. A guest order
    /// is reachable by anyone holding its reference.
    pub fn authorize_order(&self, owner: &Owner) -> Result<(), ApiError> {
        let Owner::User { user_id } = owner else {
            return Ok(());
        };
        match self {
            Caller::Guest => Err(ApiError::Unauthorized(
                "Authentication required".to_string(),
            )),
            Caller::User { role, .. } if role.as_deref() == Some(ADMIN_ROLE) => Ok(()),
            Caller::User { identity, .. } if identity.user_id == *user_id => Ok(()),
            Caller::User { .. } => Err(ApiError::Forbidden(
                "Order belongs to another user".to_string(),
            )),
        }
    }
}

/// Validates bearer tokens against a shared secret.
#[derive(Clone)]
pub struct Authenticator {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("enabled", &self.key.is_some())
            .finish()
    }
}

impl Authenticator {
    /// Creates an authenticator; with no secret every caller is a guest.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolves the caller from the request headers.
    ///
    /// No header means guest. A header that is not a valid token is rejected
    /// rather than downgraded to guest.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Caller::Guest);
        };
        let Some(key) = &self.key else {
            return Ok(Caller::Guest);
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

        let claims = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })?
            .claims;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
        let email = Email::parse(&claims.email)
            .map_err(|_| ApiError::Unauthorized("Invalid token email".to_string()))?;

        Ok(Caller::User {
            identity: Identity::new(user_id, email),
            role: claims.role,
        })
    }
}
