//! Configuration for driver names, fallback heuristics, templates and notes.
//!
//! Loaded from TOML; every section is optional and falls back to defaults
//! that match a stock Windows install of the Access ODBC drivers:
//!
//! ```toml
//! [drivers]
//! modern = "Microsoft Access Driver (*.mdb, *.accdb)"
//! legacy = "Microsoft Access Driver (*.mdb)"
//!
//! [fallback]
//! legacy_format_markers = ["previous version"]
//!
//! [templates]
//! access = "/opt/tabula/empty.mdb"
//!
//! [notes]
//! marker = "AInotes"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var naming a config file, consulted when no path is given.
pub const CONFIG_ENV: &str = "TABULA_CONFIG";
/// Env var overriding the Access template path.
pub const TEMPLATE_ENV: &str = "TABULA_TEMPLATE";
/// Template file name looked up next to the executable.
pub const DEFAULT_TEMPLATE: &str = "empty.mdb";

const DEFAULT_MODERN_DRIVER: &str = "Microsoft Access Driver (*.mdb, *.accdb)";
const DEFAULT_LEGACY_DRIVER: &str = "Microsoft Access Driver (*.mdb)";
const DEFAULT_LEGACY_MARKER: &str = "previous version";
const DEFAULT_NOTES_MARKER: &str = "AInotes";

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub drivers: DriverConfig,
    pub fallback: FallbackConfig,
    pub templates: TemplateConfig,
    pub notes: NotesConfig,
}

/// ODBC driver names tried for Access files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Current-generation driver, tried first for `.mdb` and `.accdb`.
    pub modern: String,
    /// Older driver, tried second and only for `.mdb`.
    pub legacy: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            modern: DEFAULT_MODERN_DRIVER.to_string(),
            legacy: DEFAULT_LEGACY_DRIVER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Substrings of a modern-driver error that mean "file is an older
    /// format revision". Matched case-insensitively.
    pub legacy_format_markers: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            legacy_format_markers: vec![DEFAULT_LEGACY_MARKER.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Empty Access database copied by `create` for `.mdb`/`.accdb`.
    pub access: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Infix of sidecar notes files: `<stem>.<marker>.<ext>`.
    pub marker: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_NOTES_MARKER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config file {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Finds and loads the configuration.
    ///
    /// Order: `explicit`, then `$TABULA_CONFIG`, then
    /// `<config dir>/tabula/config.toml` if it exists, then defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be loaded. A missing file in
    /// the user config directory is not an error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(explicit, std::env::var_os(CONFIG_ENV))
    }

    fn resolve_with(explicit: Option<&Path>, from_env: Option<OsString>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Some(path) = from_env {
            return Self::load_from(PathBuf::from(path));
        }
        if let Some(path) = dirs::config_dir().map(|d| d.join("tabula").join("config.toml"))
            && path.is_file()
        {
            tracing::debug!(path = %path.display(), "loading user config");
            return Self::load_from(path);
        }
        Ok(Self::default())
    }

    /// Template used to create new Access databases.
    ///
    /// `$TABULA_TEMPLATE` wins over the configured path; with neither,
    /// `empty.mdb` next to the running executable.
    pub fn access_template(&self) -> PathBuf {
        self.access_template_with(std::env::var_os(TEMPLATE_ENV))
    }

    fn access_template_with(&self, from_env: Option<OsString>) -> PathBuf {
        if let Some(path) = from_env {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.templates.access {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_TEMPLATE)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE))
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every problem if a driver name,
    /// a legacy-format marker or the notes marker is empty.
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.drivers.modern.trim().is_empty() {
            errors.push("drivers.modern cannot be empty".to_string());
        }
        if self.drivers.legacy.trim().is_empty() {
            errors.push("drivers.legacy cannot be empty".to_string());
        }

        if self
            .fallback
            .legacy_format_markers
            .iter()
            .any(|m| m.trim().is_empty())
        {
            errors.push("fallback.legacy_format_markers cannot contain empty strings".to_string());
        }
        if self.fallback.legacy_format_markers.is_empty() {
            warnings.push(
                "fallback.legacy_format_markers is empty: .accdb files will never reach the \
                 structural parser"
                    .to_string(),
            );
        }

        if self.notes.marker.trim().is_empty() {
            errors.push("notes.marker cannot be empty".to_string());
        } else if self.notes.marker.contains(['/', '\\', '*', '?', '[']) {
            errors.push(format!(
                "notes.marker '{}' must not contain path separators or glob characters",
                self.notes.marker
            ));
        }

        if let Some(template) = &self.templates.access
            && !template.is_file()
        {
            warnings.push(format!(
                "templates.access does not exist: {}",
                template.display()
            ));
        }

        if !errors.is_empty() {
            return Err(Error::Config(format!(
                "validation failed:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        Ok(ValidationResult { warnings })
    }
}
