//! Authentication: two identity paths evaluated in order
//!
//! 1. API key header (`X-Api-Key`): SHA-256 lookup resolves an
//!    organization directly; no user identity.
//! 2. Bearer token: verified against the identity provider's JWKS; the
//!    user is provisioned just-in-time and their organization (if any)
//!    becomes the request's tenant context.

pub mod api_key;
pub mod jwks;
pub mod permissions;
pub mod rate_limit;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::{AppError, ErrorCode};

use crate::db;
use crate::state::AppState;

/// Header carrying an organization API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// How the request authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Bearer,
}

/// Bearer-authenticated user identity
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Authenticated principal, stored as a request extension
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub org_id: Option<String>,
    pub user: Option<AuthUser>,
    pub method: AuthMethod,
}

/// Middleware: authenticate via API key or bearer token.
///
/// Rejects with 401 when neither path yields an identity.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    // API key path first; a hit skips the user path entirely
    if let Some(raw_key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        let context = api_key::authenticate(&state, raw_key)
            .await
            .map_err(IntoResponse::into_response)?;
        tracing::debug!(method = ?context.method, org_id = ?context.org_id, "Request authenticated");
        request.extensions_mut().insert(context);
        return Ok(next.run(request).await);
    }

    // Bearer path
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let claims = state
        .jwks
        .verify(token)
        .await
        .map_err(IntoResponse::into_response)?;

    // JIT provisioning: first sight of this subject creates the user row
    let user = db::users::upsert_from_claims(
        &state.pool,
        &claims.sub,
        &claims.email,
        claims.name.as_deref(),
    )
    .await
    .map_err(|e| AppError::from(e).into_response())?;

    let context = AuthContext {
        org_id: user.organization_id.clone(),
        user: Some(AuthUser { id: user.id }),
        method: AuthMethod::Bearer,
    };
    tracing::debug!(method = ?context.method, org_id = ?context.org_id, "Request authenticated");
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Middleware: gate endpoints that require tenant context
pub async fn require_org_middleware(request: Request, next: Next) -> Result<Response, Response> {
    let has_org = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.org_id.is_some())
        .unwrap_or(false);

    if !has_org {
        return Err(AppError::new(ErrorCode::OrgContextMissing).into_response());
    }
    Ok(next.run(request).await)
}

/// Pull the authenticated org id out of request extensions.
///
/// Handlers behind `require_org_middleware` can rely on this succeeding.
pub fn org_id(context: &AuthContext) -> Result<&str, AppError> {
    context
        .org_id
        .as_deref()
        .ok_or_else(|| AppError::new(ErrorCode::OrgContextMissing))
}
