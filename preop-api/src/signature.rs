//! Signature resolution across the storage layouts this system has used
//! over its life.
//!
//! A stored `firma_file` reference may physically live in the current
//! per-user directory, in one of two older per-user variants, in the flat
//! legacy folder shared by all users, or be a literal path recorded by a
//! very old revision. Candidates are tried in that fixed order; the first
//! existing file wins. A reference that resolves nowhere is treated as an
//! absent signature, not an error — historical records may legitimately
//! have lost theirs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use preop_common::config::StorageConfig;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Outcome of resolving one record's signature reference.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFirma {
    /// Direct path to the artifact, when one exists on disk.
    pub path: Option<PathBuf>,
    /// Self-contained `data:image/png;base64,...` representation, always
    /// produced alongside `path`. Consolidated documents render from this
    /// so a file deleted mid-render cannot break them.
    pub data_url: Option<String>,
}

impl ResolvedFirma {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.path.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SignatureResolver {
    cfg: StorageConfig,
}

impl SignatureResolver {
    pub fn new(cfg: StorageConfig) -> Self {
        Self { cfg }
    }

    /// Candidate locations in priority order, newest layout first.
    fn candidates(&self, usuario_id: i64, firma_file: &str) -> Vec<PathBuf> {
        vec![
            // Current layout: per-user firmas directory
            self.cfg.firmas_dir(usuario_id).join(firma_file),
            // Prior layout: directly under the user directory
            self.cfg.user_dir(usuario_id).join(firma_file),
            // Flat legacy folder under the PDF root, shared across users
            self.cfg.pdf_root.join(firma_file),
            // Standalone legacy firmas folder
            self.cfg.firmas_legacy_root.join(firma_file),
            // Oldest revisions stored a literal path
            PathBuf::from(firma_file),
        ]
    }

    /// Locate a record's signature and produce both the direct path and
    /// the inlined representation.
    pub fn resolve(&self, usuario_id: i64, firma_file: Option<&str>) -> ResolvedFirma {
        let Some(firma_file) = firma_file.filter(|f| !f.is_empty()) else {
            return ResolvedFirma::absent();
        };

        for candidate in self.candidates(usuario_id, firma_file) {
            if !candidate.is_file() {
                continue;
            }
            match fs::read(&candidate) {
                Ok(bytes) => {
                    debug!("Resolved firma {} at {}", firma_file, candidate.display());
                    let data_url = format!("data:image/png;base64,{}", BASE64.encode(&bytes));
                    return ResolvedFirma {
                        path: Some(candidate),
                        data_url: Some(data_url),
                    };
                }
                Err(e) => {
                    warn!("Firma {} found but unreadable: {}", candidate.display(), e);
                }
            }
        }

        debug!("Firma {} not found under any layout", firma_file);
        ResolvedFirma::absent()
    }
}
