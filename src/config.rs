//! Configuration loading for testmatrix.
//!
//! Configuration lives in a TOML file (by default `testmatrix.toml`); see
//! [`Config`] for the sections it can contain.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Name of the configuration file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "testmatrix.toml";

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
///
/// # Example
///
/// ```no_run
/// use testmatrix::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("testmatrix.toml"))?;
/// println!("History: {}", config.history.dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads configuration from a TOML string.
///
/// # Example
///
/// ```
/// use testmatrix::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [export]
///     indent = 2
/// "#)?;
///
/// assert_eq!(config.export.indent, 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

/// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists, else
/// the defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_config(path);
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return load_config(default_path);
    }
    debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.export.indent, 4);
        assert!(!config.export.strict);
        assert_eq!(config.history.max_entries, 10);
        assert_eq!(config.history.dir, PathBuf::from(".testmatrix/history"));
        assert_eq!(config.run_configuration.name, "testmatrix");
    }

    #[test]
    fn test_full_config() {
        let config = load_config_str(
            r#"
            [export]
            indent = 0
            product_name = "My IDE"
            strict = true

            [history]
            dir = "/tmp/runs"
            max_entries = 3

            [run_configuration]
            name = "app"
            type_id = "Custom"

            [run_configuration.options]
            PACKAGE = "com.example"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.indent, 0);
        assert_eq!(config.export.product_name, "My IDE");
        assert!(config.export.strict);
        assert_eq!(config.history.resolved_dir(), PathBuf::from("/tmp/runs"));
        assert_eq!(config.run_configuration.type_id, "Custom");
        assert_eq!(config.run_configuration.options["PACKAGE"], "com.example");
    }

    #[test]
    fn test_invalid_config() {
        assert!(load_config_str("[export]\nindent = \"wide\"").is_err());
    }

    #[test]
    fn test_load_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("testmatrix.toml");
        std::fs::write(&path, "[history]\nmax_entries = 1\n").unwrap();

        let config = load_config_or_default(Some(&path)).unwrap();
        assert_eq!(config.history.max_entries, 1);
        assert!(load_config(&temp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = load_config_str("[history]\ndir = \"~/runs\"").unwrap();
        assert!(!config.history.resolved_dir().starts_with("~"));
    }
}
