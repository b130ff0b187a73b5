use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{User, UserRole},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the HS256 JWT issued by `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    /// Role at issue time. Authorization always re-reads the role from the database.
    pub role: UserRole,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// issue_token
///
/// Signs a token for `user` valid for `jwt_expiry_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.jwt_expiry_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
}

/// decode_token
///
/// Validates signature, expiry, issuer and audience and returns the claims.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_issuer(&[config.jwt_issuer.as_str()]);
    validation.set_audience(&[config.jwt_audience.as_str()]);

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthorized("Token has expired".to_string()),
            _ => AppError::Unauthorized("Invalid token".to_string()),
        })
}

/// AuthUser
///
/// The resolved identity of an authenticated request. `role` and `is_active` come from
/// the database at request time, so demotions and deactivations apply immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    /// Rejects the request with 403 unless the caller holds one of `allowed`.
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, "forbidden: role not permitted");
            Err(AppError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse an identity already resolved by the auth middleware (request extensions).
/// 2. Local bypass: an `x-user-id` header naming an existing active user (`Env::Local` only).
/// 3. Bearer token extraction and JWT validation.
/// 4. Database lookup: the user must still exist and be active.
///
/// Rejection: 401 with a JSON message on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    if user.is_active {
                        return Ok(user.into());
                    }
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))?;

        let claims = decode_token(token, &config)?;

        match repo.get_user(claims.sub).await? {
            Some(user) if user.is_active => Ok(user.into()),
            _ => Err(AppError::Unauthorized("User not found or inactive".to_string())),
        }
    }
}

/// ClientIp
///
/// Best-effort caller address for the audit trail: first `x-forwarded-for` hop,
/// then `x-real-ip`.
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let ip = header_value("x-forwarded-for")
            .and_then(|forwarded| forwarded.split(',').next().map(|hop| hop.trim().to_string()))
            .filter(|hop| !hop.is_empty())
            .or_else(|| header_value("x-real-ip"));

        Ok(ClientIp(ip))
    }
}
