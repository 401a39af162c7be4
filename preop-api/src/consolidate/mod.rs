//! Consolidation engine.
//!
//! Per-user accumulation state machine: pending count below the
//! threshold accumulates; the submission that brings the count to
//! exactly the threshold triggers one rollup, after which the count is
//! back to zero. The trigger is evaluated synchronously after each
//! successful ingestion, on the count that includes the just-ingested
//! record, scoped strictly by user id.
//!
//! Rollup ordering is load-bearing: the consolidated document is
//! produced and persisted before any retirement. A failed render leaves
//! every source record and signature in place. During retirement a
//! missing signature file is logged and skipped; the row deletion is the
//! operation of record.

mod locks;

pub use locks::UserLocks;

use crate::api::ApiError;
use crate::render::{ConsolidadoDocument, DocumentRenderer, InspeccionDocument};
use crate::signature::{ResolvedFirma, SignatureResolver};
use crate::storage::ArtifactStore;
use chrono::Utc;
use preop_common::db::models::{Inspeccion, Usuario};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the post-ingestion evaluation: the PDF to hand back, and
/// whether it is the individual document or a consolidated report.
pub enum SubmitOutcome {
    Individual { filename: String, bytes: Vec<u8> },
    Consolidated { filename: String, bytes: Vec<u8> },
}

pub struct ConsolidationEngine {
    pool: SqlitePool,
    store: ArtifactStore,
    resolver: SignatureResolver,
    renderer: Arc<dyn DocumentRenderer>,
    threshold: u32,
}

impl ConsolidationEngine {
    pub fn new(
        pool: SqlitePool,
        store: ArtifactStore,
        resolver: SignatureResolver,
        renderer: Arc<dyn DocumentRenderer>,
        threshold: u32,
    ) -> Self {
        Self {
            pool,
            store,
            resolver,
            renderer,
            threshold,
        }
    }

    pub async fn pending_count(&self, usuario_id: i64) -> Result<i64, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones WHERE usuario_id = ?")
                .bind(usuario_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Evaluate the threshold after a successful ingestion.
    ///
    /// Must be called under the user's lock, with `registro` already
    /// included in the pending set.
    pub async fn after_ingest(
        &self,
        usuario: &Usuario,
        registro: &Inspeccion,
    ) -> Result<SubmitOutcome, ApiError> {
        // Individual document first, exactly as the paper flow hands the
        // driver a copy per trip
        let firma = self.resolver.resolve(usuario.id, registro.firma_file.as_deref());
        let pdf = self.renderer.render_inspeccion(&InspeccionDocument {
            nombre_conductor: &usuario.nombre,
            registro,
            firma: &firma,
        })?;
        let (filename, _path) = self.store.write_inspeccion_pdf(usuario.id, &pdf)?;

        let count = self.pending_count(usuario.id).await?;
        if count == self.threshold as i64 {
            let (reporte_filename, reporte_bytes) = self.consolidate(usuario).await?;
            return Ok(SubmitOutcome::Consolidated {
                filename: reporte_filename,
                bytes: reporte_bytes,
            });
        }

        info!(
            "Inspección registrada para {} ({} de {} pendientes)",
            usuario.nombre, count, self.threshold
        );
        Ok(SubmitOutcome::Individual {
            filename,
            bytes: pdf,
        })
    }

    /// Roll up the user's oldest `threshold` records into one report,
    /// persist it, then retire the records and their signatures.
    async fn consolidate(&self, usuario: &Usuario) -> Result<(String, Vec<u8>), ApiError> {
        let registros = self.fetch_batch(usuario.id, Order::OldestFirst).await?;
        debug_assert_eq!(registros.len(), self.threshold as usize);

        let resolved = self.resolve_batch(usuario.id, registros);

        let bytes = self.renderer.render_consolidado(&ConsolidadoDocument {
            nombre_conductor: &usuario.nombre,
            registros: &resolved,
        })?;

        // Persist the artifact and the history row before any deletion:
        // an unrenderable or unwritable batch must not destroy sources
        let (filename, path) = self.store.write_reporte_pdf(usuario.id, &usuario.nombre, &bytes)?;

        sqlx::query(
            "INSERT INTO reportes (nombre_conductor, fecha_reporte, archivo_pdf, total_incluidas) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&usuario.nombre)
        .bind(Utc::now())
        .bind(path.to_string_lossy().into_owned())
        .bind(self.threshold as i64)
        .execute(&self.pool)
        .await?;

        self.retire(&resolved).await?;

        info!(
            "Reporte consolidado {} generado para {} ({} inspecciones retiradas)",
            filename, usuario.nombre, self.threshold
        );
        Ok((filename, bytes))
    }

    /// Regenerate a consolidated document over the caller's most recent
    /// records without retiring anything. 404 when there is nothing to
    /// report on.
    pub async fn manual_report(&self, usuario: &Usuario) -> Result<(String, Vec<u8>), ApiError> {
        let registros = self.fetch_batch(usuario.id, Order::NewestFirst).await?;
        if registros.is_empty() {
            return Err(ApiError::NotFound(
                "No hay inspecciones para este conductor".to_string(),
            ));
        }

        let resolved = self.resolve_batch(usuario.id, registros);

        let bytes = self.renderer.render_consolidado(&ConsolidadoDocument {
            nombre_conductor: &usuario.nombre,
            registros: &resolved,
        })?;
        let (filename, _path) = self.store.write_reporte_pdf(usuario.id, &usuario.nombre, &bytes)?;

        Ok((filename, bytes))
    }

    async fn fetch_batch(
        &self,
        usuario_id: i64,
        order: Order,
    ) -> Result<Vec<Inspeccion>, ApiError> {
        let sql = match order {
            Order::OldestFirst => {
                "SELECT * FROM inspecciones WHERE usuario_id = ? ORDER BY fecha ASC, id ASC LIMIT ?"
            }
            Order::NewestFirst => {
                "SELECT * FROM inspecciones WHERE usuario_id = ? ORDER BY fecha DESC, id DESC LIMIT ?"
            }
        };
        let registros: Vec<Inspeccion> = sqlx::query_as(sql)
            .bind(usuario_id)
            .bind(self.threshold as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(registros)
    }

    /// Resolve every signature up front. Inlining is mandatory here:
    /// retirement deletes the files, and the report must remain
    /// renderable afterwards.
    fn resolve_batch(
        &self,
        usuario_id: i64,
        registros: Vec<Inspeccion>,
    ) -> Vec<(Inspeccion, ResolvedFirma)> {
        registros
            .into_iter()
            .map(|r| {
                let firma = self.resolver.resolve(usuario_id, r.firma_file.as_deref());
                (r, firma)
            })
            .collect()
    }

    /// Delete the consolidated rows and their signature files. File
    /// deletion is best-effort; the row deletion is what retires the
    /// record.
    async fn retire(&self, registros: &[(Inspeccion, ResolvedFirma)]) -> Result<(), ApiError> {
        for (registro, firma) in registros {
            if let Some(path) = &firma.path {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(
                        "No se pudo eliminar la firma {} de la inspección {}: {}",
                        path.display(),
                        registro.id,
                        e
                    );
                }
            }

            sqlx::query("DELETE FROM inspecciones WHERE id = ?")
                .bind(registro.id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

enum Order {
    OldestFirst,
    NewestFirst,
}
