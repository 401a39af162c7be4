//! Session endpoints: register, login, logout.

use crate::api::ApiError;
use crate::auth::{self, AuthError, CurrentUser};
use crate::AppState;
use axum::extract::State;
use axum::{Form, Json};
use preop_common::db::models::Usuario;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub nombre: String,
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub usuario_id: i64,
    pub nombre: String,
}

/// Collapse internal whitespace and capitalize, so "  ana  maria " and
/// "Ana maria" resolve to the same account.
pub fn normalize_nombre(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => collapsed,
    }
}

/// Create a driver account. Administrative provisioning; not exposed to
/// drivers in the UI.
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Json<Value>, ApiError> {
    let nombre = normalize_nombre(&form.nombre);
    if nombre.is_empty() {
        return Err(ApiError::validation("nombre", "El nombre es obligatorio"));
    }
    if form.pin.trim().is_empty() {
        return Err(ApiError::validation("pin", "El PIN es obligatorio"));
    }

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM usuarios WHERE nombre = ?")
        .bind(&nombre)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::validation("nombre", "Usuario ya existe"));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_pin(&salt, &form.pin);

    let usuario_id = sqlx::query(
        "INSERT INTO usuarios (nombre, pin_hash, pin_salt, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&nombre)
    .bind(&hash)
    .bind(&salt)
    .bind(chrono::Utc::now())
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    info!("Created user {} (id {})", nombre, usuario_id);

    Ok(Json(json!({
        "mensaje": "Usuario creado exitosamente",
        "usuario_id": usuario_id,
        "nombre": nombre,
    })))
}

/// Login with name + PIN. Any credential failure returns the same
/// generic 401; the response never says which part was wrong.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Json<LoginResponse>, ApiError> {
    let nombre = normalize_nombre(&form.nombre);

    let usuario: Option<Usuario> = sqlx::query_as("SELECT * FROM usuarios WHERE nombre = ?")
        .bind(&nombre)
        .fetch_optional(&state.db)
        .await?;

    let usuario = usuario.ok_or(AuthError::BadLogin)?;

    if !auth::verify_pin(&usuario.pin_salt, &usuario.pin_hash, &form.pin) {
        return Err(AuthError::BadLogin.into());
    }

    let duration_hours = state.config.session_duration_hours;
    let (token, _expira) = auth::issue_token(&state.db, usuario.id, duration_hours).await?;

    info!("Login: {} (id {})", usuario.nombre, usuario.id);

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        expires_in: duration_hours * 3600,
        usuario_id: usuario.id,
        nombre: usuario.nombre,
    }))
}

/// Invalidate the caller's session.
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(usuario): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    auth::invalidate(&state.db, usuario.id).await?;
    info!("Logout: {} (id {})", usuario.nombre, usuario.id);
    Ok(Json(json!({ "mensaje": "Sesión cerrada" })))
}
