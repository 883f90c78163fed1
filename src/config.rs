use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::DbError;

pub const CONFIG_FILE_NAME: &str = "nexus-shell.toml";

/// Settings shared by the binary and embedders. Every field is optional so layers can be
/// merged; unset fields fall back to defaults at the point of use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding `<collection>.bson` dumps.
    pub data_dir: Option<PathBuf>,
    /// Output format: human|plain|json.
    pub format: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// Emit audit lines for writes.
    pub audit: Option<bool>,
}

impl AppConfig {
    /// # Errors
    /// Returns `Config` when the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
    }

    /// Fill every unset field from `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            data_dir: self.data_dir.or(other.data_dir),
            format: self.format.or(other.format),
            log_dir: self.log_dir.or(other.log_dir),
            log_level: self.log_level.or(other.log_level),
            audit: self.audit.or(other.audit),
        }
    }

    /// Layer taken from `NEXUS_SHELL_DATA_DIR` and `NEXUS_SHELL_FORMAT`.
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_dir: env("NEXUS_SHELL_DATA_DIR").map(PathBuf::from),
            format: env("NEXUS_SHELL_FORMAT"),
            ..Self::default()
        }
    }

    /// Resolve the effective configuration.
    /// Precedence: CLI > env > config file (`--config`, `NEXUS_SHELL_CONFIG`, `./nexus-shell.toml`) > defaults.
    ///
    /// # Errors
    /// Returns `Config` when an explicitly named file is missing or any file is malformed.
    pub fn load(
        cli: Self,
        cli_config_path: Option<&Path>,
        cwd: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DbError> {
        let mut from_files = Self::default();
        let mut explicit: Vec<PathBuf> = Vec::new();
        if let Some(p) = cli_config_path {
            explicit.push(p.to_path_buf());
        }
        if let Some(p) = env("NEXUS_SHELL_CONFIG") {
            explicit.push(PathBuf::from(p));
        }
        for p in &explicit {
            from_files = from_files.or(Self::from_file(p)?);
        }
        if let Some(dir) = cwd {
            let local = dir.join(CONFIG_FILE_NAME);
            if local.is_file() {
                from_files = from_files.or(Self::from_file(&local)?);
            }
        }
        let resolved = cli.or(Self::from_env(&env)).or(from_files);
        log::debug!("resolved config: {resolved:?}");
        Ok(resolved)
    }
}
