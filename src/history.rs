//! Saved test runs.
//!
//! Every exported run can be kept in a history directory as a standalone
//! `testrun` document named after the run configuration and the time it was
//! saved:
//!
//! ```text
//! .testmatrix/history/
//! ├── app - 2026.01.02 at 15h 04m 05s.xml
//! └── app - 2026.01.03 at 09h 30m 00s.xml
//! ```
//!
//! Only the newest `max_entries` files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::HistoryConfig;
use crate::xml::XmlExporter;

/// Indentation of saved documents.
pub const HISTORY_INDENT: usize = 4;

/// A saved run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl HistoryEntry {
    /// File name without the `.xml` extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The history directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            dir: dir.into(),
            max_entries,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.resolved_dir(), config.max_entries)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exports a run into the history directory and prunes old entries.
    ///
    /// Returns the path of the new file.
    pub fn save(&self, exporter: &XmlExporter<'_>) -> Result<PathBuf> {
        self.save_at(exporter, Local::now())
    }

    fn save_at(&self, exporter: &XmlExporter<'_>, at: DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create history directory: {}", self.dir.display())
        })?;

        let (path, file) = self.create_unique(&file_name(exporter.run_configuration_name(), at))?;
        exporter
            .export_to_writer(std::io::BufWriter::new(file), HISTORY_INDENT)
            .with_context(|| format!("Failed to export test results to {}", path.display()))?;

        info!("Saved test results to {}", path.display());
        self.prune()?;
        Ok(path)
    }

    /// Creates `name` in the history directory, or `name (1)`, `name (2)`
    /// and so on if it is taken. Existing runs are never overwritten.
    fn create_unique(&self, name: &str) -> Result<(PathBuf, fs::File)> {
        let stem = name.strip_suffix(".xml").unwrap_or(name);
        let mut attempt = 0usize;
        loop {
            let path = match attempt {
                0 => self.dir.join(name),
                n => self.dir.join(format!("{} ({}).xml", stem, n)),
            };
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("{} already exists", path.display());
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }
    }

    /// Saved runs, newest first. A missing directory has no entries.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read history directory: {}", self.dir.display())
                });
            }
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.context("Failed to read history directory entry")?;
            let path = dir_entry.path();
            if path.extension().is_none_or(|ext| ext != "xml") {
                continue;
            }
            let modified = dir_entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            entries.push(HistoryEntry { path, modified });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
        Ok(entries)
    }

    /// Deletes all but the newest `max_entries` saved runs.
    ///
    /// Returns the number of files removed.
    pub fn prune(&self) -> Result<usize> {
        let entries = self.entries()?;
        let mut removed = 0;
        for entry in entries.iter().skip(self.max_entries) {
            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    debug!("Removed old test results {}", entry.path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", entry.path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// File name for a run saved at `at`.
///
/// Characters that are not allowed in file names are replaced with `_`.
pub fn file_name(run_name: &str, at: DateTime<Local>) -> String {
    let sanitized: String = run_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{} - {}.xml", sanitized, at.format("%Y.%m.%d at %Hh %Mm %Ss"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::model::{Device, DeviceType, TestCase, TestCaseResult};
    use crate::run_config::StaticRunConfiguration;
    use crate::tree::ResultsTree;

    fn at(secs: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 2, 15, 4, secs).unwrap()
    }

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        let file = fs::File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("app", at(5)), "app - 2026.01.02 at 15h 04m 05s.xml");
        assert_eq!(
            file_name("a/b:c", at(0)),
            "a_b_c - 2026.01.02 at 15h 04m 00s.xml"
        );
    }

    #[test]
    fn test_missing_dir_has_no_entries() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path().join("missing"), 10);
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_entries_newest_first() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "old.xml", 300);
        touch(temp.path(), "new.xml", 10);
        touch(temp.path(), "notes.txt", 0);

        let store = HistoryStore::new(temp.path(), 10);
        let names: Vec<_> = store.entries().unwrap().iter().map(HistoryEntry::name).collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        for (i, name) in ["a.xml", "b.xml", "c.xml", "d.xml"].iter().enumerate() {
            touch(temp.path(), name, 100 - i as u64 * 10);
        }

        let store = HistoryStore::new(temp.path(), 2);
        assert_eq!(store.prune().unwrap(), 2);
        let names: Vec<_> = store.entries().unwrap().iter().map(HistoryEntry::name).collect();
        assert_eq!(names, vec!["d", "c"]);
    }

    #[test]
    fn test_save_writes_document() {
        let temp = TempDir::new().unwrap();
        let device = Device::new("d1", "Pixel", DeviceType::LocalEmulator, 33);
        let mut tree = ResultsTree::new();
        tree.add_test_case(
            &device,
            TestCase::new("p", "C", "m")
                .with_result(TestCaseResult::Passed)
                .with_timestamps(0, Some(5)),
        );
        let devices = [device];
        let config = StaticRunConfiguration::new("app");
        let exporter = XmlExporter::new(&tree, &devices, &config, Duration::from_millis(5));

        let store = HistoryStore::new(temp.path().join("history"), 10);
        let path = store.save_at(&exporter, at(5)).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "app - 2026.01.02 at 15h 04m 05s.xml"
        );
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    <count name=\"total\" value=\"1\"/>"));
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_save_within_same_second_keeps_both() {
        let temp = TempDir::new().unwrap();
        let tree = ResultsTree::new();
        let config = StaticRunConfiguration::new("app");
        let exporter = XmlExporter::new(&tree, &[], &config, Duration::ZERO);

        let store = HistoryStore::new(temp.path(), 10);
        let first = store.save_at(&exporter, at(5)).unwrap();
        let second = store.save_at(&exporter, at(5)).unwrap();
        let third = store.save_at(&exporter, at(5)).unwrap();

        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "app - 2026.01.02 at 15h 04m 05s (1).xml"
        );
        assert_eq!(
            third.file_name().unwrap().to_string_lossy(),
            "app - 2026.01.02 at 15h 04m 05s (2).xml"
        );
        assert!(first.exists());
        assert_eq!(store.entries().unwrap().len(), 3);
    }
}
