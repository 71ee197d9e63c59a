use axum::{Extension, Json};

use crate::error::Result;
use crate::models::{Principal, UserResponse};

/// Verify token endpoint
/// GET /auth/verify
pub async fn verify(
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>> {
    Ok(Json(UserResponse::new(principal)))
}

/// Get user profile
/// GET /auth/profile
pub async fn profile(
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>> {
    Ok(Json(UserResponse::new(principal)))
}
