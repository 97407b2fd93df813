//! Configuration loading from disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// File searched for when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.yml";

/// Directory, relative to a root, that holds config files.
const CONFIG_DIR: &str = "config";

/// Error type for configuration loading and validation.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} not found in any known location")]
    NotFound(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid route: prefix={prefix:?} target={target:?}")]
    InvalidRoute { prefix: String, target: String },

    #[error("invalid scheme: target {target:?} is not http or https")]
    InvalidScheme { target: String },

    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("duplicate prefix: {prefix:?}")]
    DuplicatePrefix { prefix: String },

    #[error("unknown auth type {auth:?} on route {prefix:?}")]
    UnknownAuthType { prefix: String, auth: String },

    #[error("invalid auth config: {0}")]
    InvalidAuth(String),
}

/// Load configuration from a YAML or TOML file and apply env overrides.
///
/// Only syntax is checked here; routes and auth are validated when the
/// routing state is built from the result.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content)?,
        _ => parse_yaml(&content)?,
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    Ok(config)
}

/// Parse a YAML document.
pub fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
    // An empty file is an empty mapping, not an error.
    if content.trim().is_empty() {
        return Ok(GatewayConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Parse a TOML document.
pub fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Resolve the config file to load.
///
/// An explicit path wins. Otherwise `file_name` is looked up under
/// `config/` in `$APP_ROOT_DIR`, next to the executable, and in the
/// working directory, in that order.
pub fn locate_config(explicit: Option<&Path>, file_name: &str) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let mut roots = Vec::new();
    if let Ok(root) = env::var("APP_ROOT_DIR") {
        if !root.is_empty() {
            roots.push(PathBuf::from(root));
        }
    }
    if let Some(dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(dir);
    }
    if let Ok(cwd) = env::current_dir() {
        roots.push(cwd);
    }

    find_in_roots(&roots, file_name).ok_or_else(|| ConfigError::NotFound(file_name.to_string()))
}

fn find_in_roots(roots: &[PathBuf], file_name: &str) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| root.join(CONFIG_DIR).join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Overlay `GATEWAY_*` environment values onto a parsed config.
///
/// `lookup` is injected so tests do not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(secret) = lookup("GATEWAY_JWT_SECRET") {
        match config.auth.jwt.as_mut() {
            Some(jwt) => jwt.secret = secret,
            None => tracing::warn!("GATEWAY_JWT_SECRET set but no jwt-auth section configured"),
        }
    }
}
