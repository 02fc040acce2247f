//! Password hashing, token issuing and the authenticated-user extractor.

use axum::{
    RequestPartsExt, async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model::entities::user;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::schemas::AppState;

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the token owner
    pub sub: String,
    pub user_id: i32,
    pub iat: usize,
    pub exp: usize,
}

/// Signing keys and token settings.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
    hash_cost: u32,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys")
            .field("token_ttl", &self.token_ttl)
            .field("hash_cost", &self.hash_cost)
            .finish_non_exhaustive()
    }
}

impl AuthKeys {
    pub fn new(secret: &str, token_ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::minutes(token_ttl_minutes),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt cost. Tests use the minimum to stay fast.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Hashes on the blocking pool so bcrypt does not stall a runtime worker.
    pub async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_owned();
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn issue_token(&self, user: &user::Model) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            user_id: user.id,
            iat: now.timestamp() as usize,
            exp: (now + self.token_ttl).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to create token: {}", e)))
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ApiError::Unauthorized("Could not validate credentials".to_string())
            })
    }
}

/// Checks `password` against a stored bcrypt hash. A malformed hash counts as
/// a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))
}

/// The user behind the bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state.auth.decode_token(bearer.token())?;

        match user::Entity::find_by_id(claims.user_id).one(&state.db).await? {
            Some(user) if user.username == claims.sub => Ok(AuthUser {
                id: user.id,
                username: user.username,
            }),
            _ => {
                warn!("Token for unknown user {} ({})", claims.user_id, claims.sub);
                Err(ApiError::Unauthorized(
                    "Could not validate credentials".to_string(),
                ))
            }
        }
    }
}
