//! Submission ingestion: validate, store the signature artifact, persist
//! the record. Validation happens entirely before the first write.

pub mod validate;

pub use validate::{validate, SubmitForm, ValidatedSubmission};

use crate::api::ApiError;
use crate::storage::ArtifactStore;
use chrono::Utc;
use preop_common::db::models::{Inspeccion, Usuario};
use sqlx::SqlitePool;
use tracing::warn;

/// Persist one validated submission for a user.
///
/// The signature is written first; if the row insert then fails, the
/// file is removed again so a failed ingestion leaves nothing behind.
pub async fn ingest(
    pool: &SqlitePool,
    store: &ArtifactStore,
    usuario: &Usuario,
    submission: ValidatedSubmission,
) -> Result<Inspeccion, ApiError> {
    let firma_file = store
        .write_firma(usuario.id, &submission.firma_bytes)
        .map_err(|e| ApiError::Internal(format!("signature write failed: {}", e)))?;

    let fecha = Utc::now();
    let insert = sqlx::query(
        r#"
        INSERT INTO inspecciones (
            usuario_id, placa, proceso, desde, hasta,
            marca, gasolina, modelo, motor, tipo_vehiculo, linea,
            licencia_num, licencia_venc, porte_propiedad,
            soat, certificado_emision, poliza_seguro,
            aspectos, observaciones, condiciones_optimas,
            firma_file, fecha
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(usuario.id)
    .bind(&submission.placa)
    .bind(&submission.proceso)
    .bind(&submission.desde)
    .bind(&submission.hasta)
    .bind(&submission.marca)
    .bind(&submission.gasolina)
    .bind(&submission.modelo)
    .bind(&submission.motor)
    .bind(&submission.tipo_vehiculo)
    .bind(&submission.linea)
    .bind(&submission.licencia_num)
    .bind(&submission.licencia_venc)
    .bind(&submission.porte_propiedad)
    .bind(&submission.soat)
    .bind(&submission.certificado_emision)
    .bind(&submission.poliza_seguro)
    .bind(&submission.aspectos)
    .bind(&submission.observaciones)
    .bind(&submission.condiciones_optimas)
    .bind(&firma_file)
    .bind(fecha)
    .execute(pool)
    .await;

    let id = match insert {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            // Do not leave an orphaned signature behind a failed insert
            let path = store.config().firmas_dir(usuario.id).join(&firma_file);
            if let Err(rm) = std::fs::remove_file(&path) {
                warn!("Could not remove orphaned firma {}: {}", path.display(), rm);
            }
            return Err(e.into());
        }
    };

    let registro: Inspeccion = sqlx::query_as("SELECT * FROM inspecciones WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(registro)
}
