use std::collections::HashSet;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::{Actor, ClientInfo},
    db::DbPool,
    error::{AppError, AppResult},
    state::AppState,
};

/// Bearer token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// HS256 token for `user_id`; used by the seed tool and tests.
pub fn issue_token(secret: &str, user_id: Uuid, ttl_hours: i64) -> AppResult<String> {
    let exp = (Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ClientInfo {
        ip: header_str("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header_str("x-real-ip")),
        user_agent: header_str(header::USER_AGENT.as_str()),
    }
}

/// Load the actor's roles and permissions from the lookup views.
pub async fn load_actor(pool: &DbPool, user_id: Uuid) -> AppResult<Actor> {
    let user: Option<(String, bool, bool)> =
        sqlx::query_as("SELECT email, is_active, is_superuser FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    let (email, is_active, is_superuser) =
        user.ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;
    if !is_active {
        return Err(AppError::Unauthorized("Account is inactive".into()));
    }

    let roles: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT role_name FROM user_active_roles
        WHERE user_id = $1
        ORDER BY is_primary DESC, role_name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let permissions: Vec<(String, String)> =
        sqlx::query_as("SELECT code, module FROM user_permission_codes WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(Actor {
        user_id,
        email,
        is_superuser,
        roles: roles.into_iter().map(|(name,)| name).collect(),
        permissions: permissions.into_iter().collect::<HashSet<_>>(),
        client: ClientInfo::default(),
    })
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        let mut actor = load_actor(&state.pool, user_id).await?;
        actor.client = client_info(&parts.headers);
        tracing::debug!(actor_id = %actor.user_id, roles = ?actor.roles, "actor resolved");
        Ok(actor)
    }
}
