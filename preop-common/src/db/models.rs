//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A driver account. Holds at most one active session token; a new login
/// overwrites the previous token, implicitly invalidating it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Usuario {
    pub id: i64,
    pub nombre: String,
    pub pin_hash: String,
    pub pin_salt: String,
    pub token: Option<String>,
    pub token_expira: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One submitted preoperational inspection. Rows live until they are
/// consolidated into a report, at which point they are deleted together
/// with their signature file.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inspeccion {
    pub id: i64,
    pub usuario_id: i64,
    pub placa: String,
    pub proceso: String,
    pub desde: String,
    pub hasta: String,
    pub marca: Option<String>,
    pub gasolina: Option<String>,
    pub modelo: Option<String>,
    pub motor: Option<String>,
    pub tipo_vehiculo: Option<String>,
    pub linea: Option<String>,
    pub licencia_num: Option<String>,
    pub licencia_venc: Option<String>,
    pub porte_propiedad: Option<String>,
    pub soat: Option<String>,
    pub certificado_emision: Option<String>,
    pub poliza_seguro: Option<String>,
    /// Checklist map serialized as JSON text, item name to "B"/"M"
    pub aspectos: String,
    pub observaciones: Option<String>,
    pub condiciones_optimas: Option<String>,
    /// Stored signature artifact reference (generated filename)
    pub firma_file: Option<String>,
    pub fecha: DateTime<Utc>,
}

/// A completed consolidation: one archival PDF covering exactly
/// `total_incluidas` retired inspections. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reporte {
    pub id: i64,
    pub nombre_conductor: String,
    pub fecha_reporte: DateTime<Utc>,
    pub archivo_pdf: String,
    pub total_incluidas: i64,
}
