//! Inspection endpoints: submission and manual consolidated report.

use crate::api::ApiError;
use crate::auth::CurrentUser;
use crate::consolidate::SubmitOutcome;
use crate::ingest::{self, SubmitForm};
use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Form;
use std::collections::HashMap;

/// Binary PDF attachment response.
fn pdf_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Submission body in either transport the clients use:
/// `multipart/form-data` (the canvas-based UI) or urlencoded form fields.
pub struct SubmitPayload(pub SubmitForm);

#[async_trait]
impl<S> FromRequest<S> for SubmitPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|_| ApiError::validation("body", "Formulario multipart inválido"))?;

            let mut fields: HashMap<String, String> = HashMap::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|_| ApiError::validation("body", "Formulario multipart inválido"))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::validation("body", "Formulario multipart inválido"))?;
                fields.insert(name, value);
            }

            // Every field is text, so the urlencoded and multipart paths
            // share one deserialization target
            let form: SubmitForm = serde_json::to_value(fields)
                .and_then(serde_json::from_value)
                .map_err(|_| ApiError::validation("body", "Formulario multipart inválido"))?;
            return Ok(SubmitPayload(form));
        }

        let Form(form) = Form::<SubmitForm>::from_request(req, state)
            .await
            .map_err(|_| ApiError::validation("body", "Formulario inválido"))?;
        Ok(SubmitPayload(form))
    }
}

/// Submit one inspection.
///
/// Returns the individual PDF, or the consolidated report when this
/// submission brings the caller's pending count to the threshold. The
/// whole sequence runs under the caller's serialization lock so
/// concurrent submissions from one user cannot race the count.
pub async fn submit(
    State(state): State<AppState>,
    CurrentUser(usuario): CurrentUser,
    SubmitPayload(form): SubmitPayload,
) -> Result<Response, ApiError> {
    let lock = state.locks.for_user(usuario.id);
    let _guard = lock.lock().await;

    let validated = ingest::validate(&form)?;
    let registro = ingest::ingest(&state.db, &state.store, &usuario, validated).await?;

    match state.engine.after_ingest(&usuario, &registro).await? {
        SubmitOutcome::Individual { filename, bytes }
        | SubmitOutcome::Consolidated { filename, bytes } => Ok(pdf_response(&filename, bytes)),
    }
}

/// Manually regenerate a consolidated report over the caller's most
/// recent pending records.
///
/// The path segment exists for URL compatibility with older clients;
/// the report is always scoped to the authenticated caller, never to
/// whoever the segment names.
pub async fn reporte15(
    State(state): State<AppState>,
    CurrentUser(usuario): CurrentUser,
    Path(_identifier): Path<String>,
) -> Result<Response, ApiError> {
    let lock = state.locks.for_user(usuario.id);
    let _guard = lock.lock().await;

    let (filename, bytes) = state.engine.manual_report(&usuario).await?;
    Ok(pdf_response(&filename, bytes))
}
