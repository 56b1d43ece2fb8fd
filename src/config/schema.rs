//! Configuration schema for testmatrix.
//!
//! ```text
//! Config (root)
//! ├── ExportConfig              - Document layout and footer
//! ├── HistoryConfig             - Where saved runs go and how many to keep
//! └── StaticRunConfiguration    - Run configuration written into <config>
//! ```
//!
//! Every section and every field has a default, so an empty file is a valid
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::run_config::StaticRunConfiguration;

/// Root configuration structure.
///
/// # TOML Structure
///
/// ```toml
/// [export]
/// indent = 2
/// product_name = "testmatrix"
/// strict = true
///
/// [history]
/// dir = "~/.testmatrix/history"
/// max_entries = 20
///
/// [run_configuration]
/// name = "app"
/// ```
///
/// # Example
///
/// ```
/// use testmatrix::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [history]
///     max_entries = 3
/// "#).unwrap();
/// assert_eq!(config.history.max_entries, 3);
/// assert_eq!(config.export.indent, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Run configuration written into exported documents.
    #[serde(default)]
    pub run_configuration: StaticRunConfiguration,
}

/// Export settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `indent` | 4 |
/// | `product_name` | `"testmatrix"` |
/// | `strict` | false |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Spaces per nesting level; 0 writes everything on one line.
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Product named in the `footerText` attribute.
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Refuse to export runs that still have scheduled or running cases.
    ///
    /// When false (default), such cases are exported in the `suite`/`test`
    /// section but left out of `androidTestMatrix`.
    #[serde(default)]
    pub strict: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            product_name: default_product_name(),
            strict: false,
        }
    }
}

fn default_indent() -> usize {
    4
}

fn default_product_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

/// History settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `dir` | `.testmatrix/history` |
/// | `max_entries` | 10 |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Directory of saved runs. A leading `~` is expanded.
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,

    /// Number of saved runs to keep.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl HistoryConfig {
    /// `dir` with a leading `~` expanded to the home directory.
    pub fn resolved_dir(&self) -> PathBuf {
        let dir = self.dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&dir).into_owned())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_history_dir() -> PathBuf {
    PathBuf::from(".testmatrix/history")
}

fn default_max_entries() -> usize {
    10
}
