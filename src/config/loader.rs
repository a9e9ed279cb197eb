//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxySettings;
use crate::config::validation::ValidationError;

/// Base name of the configuration file.
pub const CONFIG_NAME: &str = "config";

/// Directory under `$HOME` searched before the working directory.
pub const HOME_CONFIG_DIR: &str = ".mini-auth-proxy";

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "toml"];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("No configuration file found (searched {})", join_paths(.0))]
    NotFound(Vec<PathBuf>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load settings from a YAML or TOML file.
///
/// The format follows the extension; anything other than `.toml` is read as
/// YAML.
pub fn load_settings(path: &Path) -> Result<ProxySettings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        Ok(toml::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Candidate configuration paths, in search order.
pub fn search_paths(home: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = home {
        dirs.push(home.join(HOME_CONFIG_DIR));
    }
    dirs.push(cwd.to_path_buf());

    dirs.iter()
        .flat_map(|dir| {
            EXTENSIONS
                .iter()
                .map(move |ext| dir.join(format!("{CONFIG_NAME}.{ext}")))
        })
        .collect()
}

/// Resolve the configuration file to use.
///
/// An explicit path wins; otherwise `$HOME/.mini-auth-proxy` and then the
/// working directory are searched for `config.{yaml,yml,toml}`.
pub fn locate_config(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = search_paths(dirs::home_dir().as_deref(), &cwd);

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(ConfigError::NotFound(candidates))
}
