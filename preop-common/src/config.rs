//! Configuration loading and data-root resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Number of pending inspections that triggers a consolidated report.
pub const DEFAULT_CONSOLIDATION_THRESHOLD: u32 = 15;

/// Session token lifetime in hours.
pub const DEFAULT_SESSION_DURATION_HOURS: i64 = 24;

/// Smallest signature payload accepted as a real drawing. Anything below
/// this is a blank or truncated canvas export.
pub const MIN_SIGNATURE_BYTES: usize = 128;

/// Service-level tunables, resolved once at startup and passed explicitly
/// to the components that need them.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub session_duration_hours: i64,
    pub consolidation_threshold: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5780,
            session_duration_hours: DEFAULT_SESSION_DURATION_HOURS,
            consolidation_threshold: DEFAULT_CONSOLIDATION_THRESHOLD,
        }
    }
}

/// Filesystem layout for generated artifacts.
///
/// Constructed from the resolved data root and handed to the artifact
/// store and signature resolver; no component reads ambient path globals.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root for generated PDFs and per-user subtrees
    /// (`<data_root>/generated_pdfs`).
    pub pdf_root: PathBuf,
    /// Legacy flat signature folder (`<data_root>/firmas`), shared across
    /// users by older deployments.
    pub firmas_legacy_root: PathBuf,
}

impl StorageConfig {
    pub fn new(data_root: &Path) -> Self {
        Self {
            pdf_root: data_root.join("generated_pdfs"),
            firmas_legacy_root: data_root.join("firmas"),
        }
    }

    /// Per-user subtree under the PDF root.
    pub fn user_dir(&self, usuario_id: i64) -> PathBuf {
        self.pdf_root.join("usuarios").join(usuario_id.to_string())
    }

    /// Current signature directory for a user.
    pub fn firmas_dir(&self, usuario_id: i64) -> PathBuf {
        self.user_dir(usuario_id).join("firmas")
    }

    /// Individual inspection PDFs for a user.
    pub fn inspecciones_dir(&self, usuario_id: i64) -> PathBuf {
        self.user_dir(usuario_id).join("inspecciones")
    }

    /// Consolidated report PDFs for a user.
    pub fn reportes_dir(&self, usuario_id: i64) -> PathBuf {
        self.user_dir(usuario_id).join("reportes")
    }
}

/// Data root resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`data_root` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_root(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_root) = config.get("data_root").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(data_root));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_root())
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/preop/config.toml first, then /etc/preop/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("preop").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/preop/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("preop").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default data root path
fn default_data_root() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("preop"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\preop"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("preop"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/preop"))
    } else if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("preop"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/preop"))
    } else {
        PathBuf::from("./preop_data")
    }
}
