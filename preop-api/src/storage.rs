//! Artifact store: signature images and generated PDFs on the local
//! filesystem, laid out per user under the configured PDF root.
//!
//! All paths come from the `StorageConfig` handed in at construction;
//! nothing here reads ambient globals.

use chrono::Utc;
use preop_common::config::StorageConfig;
use preop_common::Result;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cfg: StorageConfig,
}

impl ArtifactStore {
    pub fn new(cfg: StorageConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.cfg
    }

    /// Write a decoded signature payload under the user's signature
    /// directory and return the generated filename.
    ///
    /// Filenames carry a timestamp plus a random suffix so that two
    /// submissions within the same second cannot collide.
    pub fn write_firma(&self, usuario_id: i64, bytes: &[u8]) -> Result<String> {
        let dir = self.cfg.firmas_dir(usuario_id);
        fs::create_dir_all(&dir)?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let filename = format!("firma_{}_{}.png", timestamp, suffix);

        fs::write(dir.join(&filename), bytes)?;
        Ok(filename)
    }

    /// Write an individual inspection PDF, returning (filename, full path).
    pub fn write_inspeccion_pdf(&self, usuario_id: i64, bytes: &[u8]) -> Result<(String, PathBuf)> {
        let dir = self.cfg.inspecciones_dir(usuario_id);
        fs::create_dir_all(&dir)?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let filename = format!("inspeccion_{}.pdf", timestamp);
        let path = dir.join(&filename);

        fs::write(&path, bytes)?;
        Ok((filename, path))
    }

    /// Write a consolidated report PDF, returning (filename, full path).
    pub fn write_reporte_pdf(
        &self,
        usuario_id: i64,
        nombre_conductor: &str,
        bytes: &[u8],
    ) -> Result<(String, PathBuf)> {
        let dir = self.cfg.reportes_dir(usuario_id);
        fs::create_dir_all(&dir)?;

        let timestamp = Utc::now().format("%Y%m%d%H%M");
        // Driver names may contain spaces; keep the filename shell-friendly
        let safe_nombre: String = nombre_conductor
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let filename = format!("reporte15_{}_{}.pdf", safe_nombre, timestamp);
        let path = dir.join(&filename);

        fs::write(&path, bytes)?;
        Ok((filename, path))
    }
}
