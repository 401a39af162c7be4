//! Document rendering seam.
//!
//! The rendering engine proper is an external collaborator; the pipeline
//! only depends on the [`DocumentRenderer`] trait. The built-in
//! [`PdfRenderer`] produces minimal self-contained PDF byte streams from
//! the document context, which is enough for the service to hand back a
//! downloadable attachment. Signature images arrive pre-inlined in the
//! context, so rendering never touches the original files.

mod pdf;

use crate::signature::ResolvedFirma;
use preop_common::db::models::Inspeccion;
use thiserror::Error;

/// Form metadata printed on every document, carried over from the paper
/// format this system replaced.
pub const CODIGO_FORMATO: &str = "FO-SST-063";
pub const VERSION_FORMATO: &str = "01";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Document rendering failed: {0}")]
    Failed(String),
}

/// Context for one individual inspection document.
pub struct InspeccionDocument<'a> {
    pub nombre_conductor: &'a str,
    pub registro: &'a Inspeccion,
    pub firma: &'a ResolvedFirma,
}

/// Context for a consolidated report over an ordered record list.
pub struct ConsolidadoDocument<'a> {
    pub nombre_conductor: &'a str,
    pub registros: &'a [(Inspeccion, ResolvedFirma)],
}

pub trait DocumentRenderer: Send + Sync {
    fn render_inspeccion(&self, doc: &InspeccionDocument<'_>) -> Result<Vec<u8>, RenderError>;
    fn render_consolidado(&self, doc: &ConsolidadoDocument<'_>) -> Result<Vec<u8>, RenderError>;
}

/// Built-in renderer: plain-text PDF pages, one inspection per page.
#[derive(Debug, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }

    fn registro_lines(registro: &Inspeccion, firma: &ResolvedFirma) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let mut lines = vec![
            format!("Fecha: {}", registro.fecha.format("%d - %m - %Y")),
            format!("Placa: {}", registro.placa),
            format!("Proceso: {}", registro.proceso),
            format!("Desde: {}  Hasta: {}", registro.desde, registro.hasta),
            format!("Marca: {}  Linea: {}", opt(&registro.marca), opt(&registro.linea)),
            format!(
                "Modelo: {}  Motor: {}  Gasolina: {}",
                opt(&registro.modelo),
                opt(&registro.motor),
                opt(&registro.gasolina)
            ),
            format!("Tipo de vehiculo: {}", opt(&registro.tipo_vehiculo)),
            format!(
                "Licencia: {}  Vence: {}",
                opt(&registro.licencia_num),
                opt(&registro.licencia_venc)
            ),
            format!(
                "SOAT: {}  Emisiones: {}  Poliza: {}",
                opt(&registro.soat),
                opt(&registro.certificado_emision),
                opt(&registro.poliza_seguro)
            ),
        ];

        // Checklist map: one line per aspect
        if let Ok(aspectos) =
            serde_json::from_str::<std::collections::BTreeMap<String, String>>(&registro.aspectos)
        {
            for (aspecto, estado) in aspectos {
                lines.push(format!("  {}: {}", aspecto, estado));
            }
        }

        if let Some(obs) = &registro.observaciones {
            if !obs.is_empty() {
                lines.push(format!("Observaciones: {}", obs));
            }
        }
        lines.push(format!(
            "Condiciones optimas: {}",
            opt(&registro.condiciones_optimas)
        ));
        lines.push(match &firma.data_url {
            Some(data_url) => format!("Firma del conductor: [inline, {} bytes]", data_url.len()),
            None => "Firma del conductor: (sin firma)".to_string(),
        });

        lines
    }

    fn header_lines(nombre_conductor: &str) -> Vec<String> {
        vec![
            "INSPECCION PREOPERACIONAL DE VEHICULOS".to_string(),
            format!("Codigo: {}  Version: {}", CODIGO_FORMATO, VERSION_FORMATO),
            format!("Conductor: {}", nombre_conductor),
            String::new(),
        ]
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render_inspeccion(&self, doc: &InspeccionDocument<'_>) -> Result<Vec<u8>, RenderError> {
        let mut lines = Self::header_lines(doc.nombre_conductor);
        lines.extend(Self::registro_lines(doc.registro, doc.firma));
        Ok(pdf::build_pdf(&[lines]))
    }

    fn render_consolidado(&self, doc: &ConsolidadoDocument<'_>) -> Result<Vec<u8>, RenderError> {
        if doc.registros.is_empty() {
            return Err(RenderError::Failed(
                "consolidated report needs at least one record".to_string(),
            ));
        }

        let pages: Vec<Vec<String>> = doc
            .registros
            .iter()
            .enumerate()
            .map(|(i, (registro, firma))| {
                let mut lines = Self::header_lines(doc.nombre_conductor);
                lines.insert(
                    3,
                    format!("Registro {} de {}", i + 1, doc.registros.len()),
                );
                lines.extend(Self::registro_lines(registro, firma));
                lines
            })
            .collect();

        Ok(pdf::build_pdf(&pages))
    }
}
