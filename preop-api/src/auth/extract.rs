//! Axum extractor binding the bearer token to a user.

use super::{authenticate, AuthFailure};
use crate::api::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use preop_common::db::models::Usuario;
use tracing::error;

/// The authenticated caller. Handlers that take this extractor are
/// reachable only with a live session.
pub struct CurrentUser(pub Usuario);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match authenticate(&state.db, authorization).await {
            Ok(usuario) => Ok(CurrentUser(usuario)),
            Err(AuthFailure::Auth(e)) => Err(ApiError::Auth(e)),
            Err(AuthFailure::Database(e)) => {
                error!("Token lookup failed: {}", e);
                Err(ApiError::Internal("authentication lookup failed".to_string()))
            }
        }
    }
}
