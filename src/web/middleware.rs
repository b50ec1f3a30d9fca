use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AppState, HttpError};

/// Token claims; `sub` is the owner id that scopes every store lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Bearer-token verification for every competition route.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| HttpError::unauthorized("Unauthorized"))?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.auth.secret_key.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!(error = %e, "Token verification failed");
        HttpError::unauthorized("Unauthorized")
    })?;

    request.extensions_mut().insert(AuthUser {
        id: decoded.claims.sub,
    });
    Ok(next.run(request).await)
}
