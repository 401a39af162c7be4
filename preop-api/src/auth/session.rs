//! Token issuance, validation, and invalidation.

use super::AuthError;
use chrono::{DateTime, Duration, Utc};
use preop_common::db::models::Usuario;
use preop_common::Result;
use rand::RngCore;
use sqlx::SqlitePool;

/// Generate an opaque session token: 128 bits from the OS CSPRNG,
/// hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Issue a fresh token for a user and persist it on the row, overwriting
/// (and thereby invalidating) any prior token.
pub async fn issue_token(
    pool: &SqlitePool,
    usuario_id: i64,
    duration_hours: i64,
) -> Result<(String, DateTime<Utc>)> {
    let token = generate_token();
    let expira = Utc::now() + Duration::hours(duration_hours);

    sqlx::query("UPDATE usuarios SET token = ?, token_expira = ? WHERE id = ?")
        .bind(&token)
        .bind(expira)
        .bind(usuario_id)
        .execute(pool)
        .await?;

    Ok((token, expira))
}

/// Validate an `Authorization` header value and return the bound user.
///
/// Never returns a partially validated user: header shape, token lookup,
/// and expiry must all pass.
pub async fn authenticate(
    pool: &SqlitePool,
    authorization: Option<&str>,
) -> std::result::Result<Usuario, AuthFailure> {
    let header = authorization.ok_or(AuthError::MissingCredential)?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MalformedCredential)?;

    let usuario: Option<Usuario> = sqlx::query_as("SELECT * FROM usuarios WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    let usuario = usuario.ok_or(AuthError::InvalidSession)?;

    match usuario.token_expira {
        Some(expira) if expira > Utc::now() => Ok(usuario),
        _ => Err(AuthError::ExpiredSession.into()),
    }
}

/// Clear a user's token and expiry. Subsequent lookups with the old
/// token fail with `InvalidSession`.
pub async fn invalidate(pool: &SqlitePool, usuario_id: i64) -> Result<()> {
    sqlx::query("UPDATE usuarios SET token = NULL, token_expira = NULL WHERE id = ?")
        .bind(usuario_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Authentication can fail on the credential itself or on the lookup.
#[derive(Debug)]
pub enum AuthFailure {
    Auth(AuthError),
    Database(sqlx::Error),
}

impl From<AuthError> for AuthFailure {
    fn from(e: AuthError) -> Self {
        AuthFailure::Auth(e)
    }
}

impl From<sqlx::Error> for AuthFailure {
    fn from(e: sqlx::Error) -> Self {
        AuthFailure::Database(e)
    }
}
