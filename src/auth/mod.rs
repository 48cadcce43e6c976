//! Identity context and authorization primitives.
//!
//! Authentication (token issuance, password handling) lives outside this
//! service; the core only consumes bearer tokens minted by the auth layer
//! and resolves them into an [`Identity`] of `{user_id, role, company_id,
//! unit, is_active}`. Everything downstream — the scope resolver, the
//! permission matrix, the order state machine — keys off that context.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

mod permissions;
mod roles;

pub use permissions::{
    features, modules, Action, Capabilities, GrantSpec, PermissionMatrix,
};
pub use roles::Role;

/// Claim structure for bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub company_id: Option<String>,
    pub unit: Option<String>,
    pub is_active: bool,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// The authenticated caller, as consumed by every scope and permission
/// decision. `company_id` being `None` on a company-scoped role is a
/// misconfiguration, handled fail-closed by the scope resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub unit: Option<String>,
    pub is_active: bool,
}

impl Identity {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    pub fn belongs_to_company(&self, company_id: Uuid) -> bool {
        self.company_id == Some(company_id)
    }

    fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("malformed subject".into()))?;
        let role = Role::from_str(&claims.role)
            .map_err(|_| AuthError::InvalidToken(format!("unknown role '{}'", claims.role)))?;
        let company_id = claims
            .company_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AuthError::InvalidToken("malformed company id".into()))?;

        Ok(Identity {
            user_id,
            role,
            company_id,
            unit: claims.unit,
            is_active: claims.is_active,
        })
    }
}

/// Token verification settings, shared through the application state.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Account is deactivated")]
    InactiveUser,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InactiveUser => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Unauthorized"),
            "message": self.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        }));
        (status, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    AuthSettings: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = AuthSettings::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header_value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AuthError::MissingToken)?;

        let claims = decode_token(token, &settings)?;
        let identity = Identity::from_claims(claims)?;

        if !identity.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(identity)
    }
}

fn decode_token(token: &str, settings: &AuthSettings) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_audience(&[&settings.audience]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken(err.to_string()),
    })
}

/// Token helpers used by tests and provisioning tooling. Interactive login
/// flows are owned by the external auth service.
pub mod token {
    use super::*;

    pub fn issue(settings: &AuthSettings, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            role: identity.role.to_string(),
            company_id: identity.company_id.map(|id| id.to_string()),
            unit: identity.unit.clone(),
            is_active: identity.is_active,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + settings.token_ttl_secs,
            iss: settings.issuer.clone(),
            aud: settings.audience.clone(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
        )
        .map_err(|err| AuthError::InvalidToken(err.to_string()))
    }
}
