//! Submission validation. Everything here runs before any file or row is
//! written; a failure leaves no trace.

use crate::api::ApiError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use preop_common::config::MIN_SIGNATURE_BYTES;
use serde::Deserialize;
use std::collections::HashMap;

fn default_tipo_vehiculo() -> String {
    "Moto".to_string()
}

fn default_aspectos() -> String {
    "{}".to_string()
}

fn default_condiciones() -> String {
    "SI".to_string()
}

/// Raw form fields as submitted by the client.
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub placa: String,
    #[serde(default)]
    pub proceso: String,
    #[serde(default)]
    pub desde: String,
    #[serde(default)]
    pub hasta: String,
    #[serde(default)]
    pub marca: String,
    #[serde(default)]
    pub gasolina: String,
    #[serde(default)]
    pub modelo: String,
    #[serde(default)]
    pub motor: String,
    #[serde(default = "default_tipo_vehiculo")]
    pub tipo_vehiculo: String,
    #[serde(default)]
    pub linea: String,
    #[serde(default)]
    pub licencia_num: String,
    #[serde(default)]
    pub licencia_venc: String,
    #[serde(default)]
    pub porte_propiedad: String,
    #[serde(default)]
    pub soat: String,
    #[serde(default)]
    pub certificado_emision: String,
    #[serde(default)]
    pub poliza_seguro: String,
    /// JSON map of checklist item to "B"/"M"
    #[serde(default = "default_aspectos")]
    pub aspectos: String,
    /// Signature transported as a data URI (`data:image/png;base64,...`)
    #[serde(default)]
    pub firma_dataurl: String,
    #[serde(default)]
    pub observaciones: String,
    #[serde(default = "default_condiciones")]
    pub condiciones_optimas: String,
}

// Matches the field-level serde defaults so missing form fields and a
// default-constructed form mean the same thing.
impl Default for SubmitForm {
    fn default() -> Self {
        Self {
            placa: String::new(),
            proceso: String::new(),
            desde: String::new(),
            hasta: String::new(),
            marca: String::new(),
            gasolina: String::new(),
            modelo: String::new(),
            motor: String::new(),
            tipo_vehiculo: default_tipo_vehiculo(),
            linea: String::new(),
            licencia_num: String::new(),
            licencia_venc: String::new(),
            porte_propiedad: String::new(),
            soat: String::new(),
            certificado_emision: String::new(),
            poliza_seguro: String::new(),
            aspectos: default_aspectos(),
            firma_dataurl: String::new(),
            observaciones: String::new(),
            condiciones_optimas: default_condiciones(),
        }
    }
}

/// A submission that passed every validation rule, ready to persist.
#[derive(Debug)]
pub struct ValidatedSubmission {
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
    pub aspectos: String,
    pub observaciones: Option<String>,
    pub condiciones_optimas: Option<String>,
    pub firma_bytes: Vec<u8>,
}

/// Uppercase, strip everything non-alphanumeric, cap at 7 characters.
pub fn normalize_placa(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(7)
        .collect()
}

/// Decode a `data:<mime>;base64,<payload>` string.
fn decode_dataurl(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.trim();
    if !raw.starts_with("data:") {
        return None;
    }
    let (_header, payload) = raw.split_once(",")?;
    BASE64.decode(payload.trim()).ok()
}

fn opt(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The needs-attention status in the checklist map ("M" = malo).
fn needs_attention(estado: &str) -> bool {
    estado.trim().eq_ignore_ascii_case("m")
}

/// Apply the full validation policy. All rules must pass before the
/// caller persists anything.
pub fn validate(form: &SubmitForm) -> Result<ValidatedSubmission, ApiError> {
    let placa = normalize_placa(&form.placa);
    if placa.is_empty() {
        return Err(ApiError::validation("placa", "La placa es obligatoria"));
    }
    if placa.len() < 5 {
        return Err(ApiError::validation(
            "placa",
            "La placa debe tener al menos 5 caracteres alfanuméricos",
        ));
    }

    let proceso = opt(&form.proceso)
        .ok_or_else(|| ApiError::validation("proceso", "El proceso es obligatorio"))?;
    let desde = opt(&form.desde)
        .ok_or_else(|| ApiError::validation("desde", "El origen es obligatorio"))?;
    let hasta = opt(&form.hasta)
        .ok_or_else(|| ApiError::validation("hasta", "El destino es obligatorio"))?;

    // Signature is mandatory and must be a plausible drawing, not a
    // blank canvas export
    if form.firma_dataurl.trim().is_empty() {
        return Err(ApiError::validation("firma", "La firma es obligatoria"));
    }
    let firma_bytes = decode_dataurl(&form.firma_dataurl)
        .ok_or_else(|| ApiError::validation("firma", "La firma no es un data URI válido"))?;
    if firma_bytes.len() < MIN_SIGNATURE_BYTES {
        return Err(ApiError::validation("firma", "La firma está vacía o incompleta"));
    }

    let modelo = opt(&form.modelo);
    if let Some(m) = &modelo {
        if m.len() != 4 || !m.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::validation(
                "modelo",
                "El modelo debe ser un año de 4 dígitos",
            ));
        }
    }

    let licencia_num = opt(&form.licencia_num);
    if let Some(l) = &licencia_num {
        if l.chars().count() < 6 {
            return Err(ApiError::validation(
                "licencia_num",
                "La licencia debe tener al menos 6 caracteres",
            ));
        }
    }

    // Checklist map must parse; a needs-attention entry requires a
    // meaningful remark (cross-field rule)
    let aspectos_map: HashMap<String, String> = serde_json::from_str(&form.aspectos)
        .map_err(|_| ApiError::validation("aspectos", "Los aspectos deben ser un objeto JSON"))?;

    let observaciones = opt(&form.observaciones);
    if aspectos_map.values().any(|estado| needs_attention(estado)) {
        // Character count, not byte length: accented Spanish remarks
        // must not satisfy the minimum early
        let long_enough = observaciones
            .as_deref()
            .map(|o| o.chars().count() >= 6)
            .unwrap_or(false);
        if !long_enough {
            return Err(ApiError::validation(
                "observaciones",
                "Un aspecto en mal estado requiere observaciones de al menos 6 caracteres",
            ));
        }
    }

    Ok(ValidatedSubmission {
        placa,
        proceso,
        desde,
        hasta,
        marca: opt(&form.marca),
        gasolina: opt(&form.gasolina),
        modelo,
        motor: opt(&form.motor),
        tipo_vehiculo: opt(&form.tipo_vehiculo),
        linea: opt(&form.linea),
        licencia_num,
        licencia_venc: opt(&form.licencia_venc),
        porte_propiedad: opt(&form.porte_propiedad),
        soat: opt(&form.soat),
        certificado_emision: opt(&form.certificado_emision),
        poliza_seguro: opt(&form.poliza_seguro),
        aspectos: form.aspectos.clone(),
        observaciones,
        condiciones_optimas: opt(&form.condiciones_optimas),
        firma_bytes,
    })
}

/// Well-formed signature data URI for tests, comfortably above the
/// minimum size threshold.
#[cfg(test)]
pub(crate) fn test_firma_dataurl() -> String {
    let bytes = vec![0x89u8; 4 * MIN_SIGNATURE_BYTES];
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}
