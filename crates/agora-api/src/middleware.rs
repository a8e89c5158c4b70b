use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use agora_types::api::Claims;

use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header; the decoded
/// claims are attached to the request for handlers to pick up. Missing or
/// invalid tokens short-circuit before any handler logic runs.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let secret = jwt_secret();

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

pub fn jwt_secret() -> String {
    std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}
