//! Optional bearer-token authentication.
//!
//! Token comparison is constant-time. With no token configured every
//! request passes.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::error::ServerError;
use crate::state::AppState;

/// Compare two strings in constant time.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Authentication middleware for the API routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    validate_request(&request, state.config().auth_token.as_deref())?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, expected: Option<&str>) -> Result<(), ServerError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ServerError::Unauthorized("missing authorization token".into()))?;
    let value = header
        .to_str()
        .map_err(|_| ServerError::Unauthorized("invalid authorization header".into()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Unauthorized("expected a bearer token".into()))?;

    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(ServerError::Unauthorized("invalid token".into()))
    }
}
