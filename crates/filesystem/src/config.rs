//! Resolved options controlling one change-scan run.

use std::path::{Path, PathBuf};

use changescan_common::{lexical_normalize, to_absolute};
use serde::{Deserialize, Serialize};

use crate::error::FileSystemError;
use crate::exclusion::{ExclusionRule, ExclusionSet};

/// Everything a run needs to know.
///
/// In scanless mode no directory is walked: the snapshot stored at
/// `snapshot_save_path` is loaded and used as the run's current snapshot,
/// and the baseline is still read from `snapshot_comparison_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScanConfiguration {
    /// Root of the tree to scan.
    #[serde(rename = "rootDirectory")]
    pub starting_directory: PathBuf,
    /// Load a stored snapshot instead of walking the tree.
    #[serde(rename = "scanlessComparison", default)]
    pub is_scanless_comparison: bool,
    /// Where the fresh scan is saved; in scanless mode, where it is loaded from.
    #[serde(rename = "savePath", default)]
    pub snapshot_save_path: Option<PathBuf>,
    /// Baseline snapshot to diff against.
    #[serde(rename = "comparisonPath", default)]
    pub snapshot_comparison_path: Option<PathBuf>,
    /// Destination handed to report generators.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Paths pruned from the walk.
    #[serde(default)]
    pub exclusions: ExclusionSet,
}

impl ScanConfiguration {
    /// Start a configuration that scans `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            starting_directory: root.into(),
            ..Default::default()
        }
    }

    /// Start a scanless configuration that diffs two stored snapshots.
    ///
    /// # Arguments
    /// * `current` - Stored snapshot treated as this run's scan
    /// * `baseline` - Stored snapshot treated as the original
    pub fn scanless(current: impl Into<PathBuf>, baseline: impl Into<PathBuf>) -> Self {
        Self {
            is_scanless_comparison: true,
            snapshot_save_path: Some(current.into()),
            snapshot_comparison_path: Some(baseline.into()),
            ..Default::default()
        }
    }

    /// Set the save path.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_save_path = Some(path.into());
        self
    }

    /// Set the baseline path.
    pub fn with_comparison_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_comparison_path = Some(path.into());
        self
    }

    /// Set the report path.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Append an exclusion rule.
    pub fn with_exclusion(mut self, rule: ExclusionRule) -> Self {
        self.exclusions.push(rule);
        self
    }

    /// Whether the fresh scan should be persisted.
    pub fn save_requested(&self) -> bool {
        self.snapshot_save_path.is_some()
    }

    /// Whether a baseline comparison should be performed.
    pub fn comparison_requested(&self) -> bool {
        self.snapshot_comparison_path.is_some()
    }

    /// Whether a report should be produced.
    pub fn report_requested(&self) -> bool {
        self.report_path.is_some()
    }

    /// Whether `candidate` is pruned by any exclusion rule.
    pub fn excludes(&self, candidate: &str) -> bool {
        self.exclusions.excludes(candidate)
    }

    /// Check that the options describe a coherent run.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when scanless mode lacks either snapshot, or
    /// when a scan has no root directory.
    pub fn validate(&self) -> Result<(), FileSystemError> {
        if self.is_scanless_comparison {
            if !self.save_requested() {
                return Err(FileSystemError::config(
                    "scanless comparison needs a stored snapshot to use as the current scan",
                ));
            }
            if !self.comparison_requested() {
                return Err(FileSystemError::config(
                    "scanless comparison needs a baseline snapshot to compare against",
                ));
            }
        } else if self.starting_directory.as_os_str().is_empty() {
            return Err(FileSystemError::config("no root directory to scan"));
        }
        Ok(())
    }

    /// Absolute, lexically normalized form of the root directory.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn resolved_root(&self) -> Result<PathBuf, FileSystemError> {
        let absolute: PathBuf = to_absolute(&self.starting_directory)?;
        Ok(lexical_normalize(&absolute))
    }

    /// Exclusion rules with exact paths resolved like [`Self::resolved_root`],
    /// so they compare equal to the keys a scan produces.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn resolved_exclusions(&self) -> Result<ExclusionSet, FileSystemError> {
        self.exclusions
            .rules()
            .iter()
            .map(ExclusionRule::resolved)
            .collect()
    }

    /// Load a configuration from a JSON document.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or does not parse.
    pub fn from_json_file(path: &Path) -> Result<Self, FileSystemError> {
        let text: String = std::fs::read_to_string(path)
            .map_err(|e| FileSystemError::io(path.display().to_string(), e))?;
        serde_json::from_str(&text).map_err(|e| {
            FileSystemError::config(format!("{}: {}", path.display(), e))
        })
    }

    /// Log what this run is about to do.
    pub fn describe(&self) {
        if self.is_scanless_comparison {
            log::info!("Comparing two stored snapshots; no scan is being performed");
            if let Some(path) = &self.snapshot_save_path {
                log::info!("  current:  {}", path.display());
            }
            if let Some(path) = &self.snapshot_comparison_path {
                log::info!("  baseline: {}", path.display());
            }
        } else {
            log::info!("Scanning file system from {}", self.starting_directory.display());
            if let Some(path) = &self.snapshot_save_path {
                log::info!("Saving the scan as a snapshot: {}", path.display());
            }
            if let Some(path) = &self.snapshot_comparison_path {
                log::info!("Comparing scan result to {}", path.display());
            }
            for rule in self.exclusions.rules() {
                log::debug!("Excluding {}", rule);
            }
        }

        if let Some(path) = &self.report_path {
            log::info!("Report will be generated to {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionCategory;

    #[test]
    fn test_predicates_follow_paths() {
        let config: ScanConfiguration = ScanConfiguration::new("/srv");
        assert!(!config.save_requested());
        assert!(!config.comparison_requested());
        assert!(!config.report_requested());

        let config: ScanConfiguration = config
            .with_save_path("/tmp/now")
            .with_comparison_path("/tmp/then")
            .with_report_path("/tmp/report.html");
        assert!(config.save_requested());
        assert!(config.comparison_requested());
        assert!(config.report_requested());
    }

    #[test]
    fn test_validate_scanless_requirements() {
        assert!(ScanConfiguration::scanless("/a", "/b").validate().is_ok());

        let mut missing_baseline: ScanConfiguration = ScanConfiguration::scanless("/a", "/b");
        missing_baseline.snapshot_comparison_path = None;
        assert!(matches!(
            missing_baseline.validate(),
            Err(FileSystemError::InvalidConfig { .. })
        ));

        let mut missing_current: ScanConfiguration = ScanConfiguration::scanless("/a", "/b");
        missing_current.snapshot_save_path = None;
        assert!(missing_current.validate().is_err());
    }

    #[test]
    fn test_validate_requires_root_for_scan() {
        assert!(ScanConfiguration::default().validate().is_err());
        assert!(ScanConfiguration::new("/srv").validate().is_ok());
    }

    #[test]
    fn test_resolved_root_normalizes() {
        let config: ScanConfiguration = ScanConfiguration::new("/srv/./www/../data/");
        assert_eq!(config.resolved_root().unwrap(), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_resolved_exclusions_match_scan_keys() {
        let config: ScanConfiguration = ScanConfiguration::new("site")
            .with_exclusion(ExclusionRule::file("site/secret.txt"))
            .with_exclusion(ExclusionRule::directory("/srv/www/./tmp/"))
            .with_exclusion(ExclusionRule::pattern("site/cache"));

        let resolved: ExclusionSet = config.resolved_exclusions().unwrap();
        let root: PathBuf = config.resolved_root().unwrap();
        let expected_file: String = root.join("secret.txt").to_string_lossy().into_owned();

        assert_eq!(resolved.rules()[0].specifics(), expected_file);
        assert_eq!(resolved.rules()[1].specifics(), "/srv/www/tmp");
        assert_eq!(resolved.rules()[2].specifics(), "site/cache");
        assert_eq!(resolved.rules()[0].category(), ExclusionCategory::File);
    }

    #[test]
    fn test_excludes_delegates_to_rules() {
        let config: ScanConfiguration =
            ScanConfiguration::new("/srv").with_exclusion(ExclusionRule::pattern("cache"));
        assert!(config.excludes("/srv/cache/x"));
        assert!(!config.excludes("/srv/data/x"));
    }

    #[test]
    fn test_from_json_file() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "rootDirectory": "/srv/www",
                "savePath": "/var/lib/changescan/today",
                "comparisonPath": "/var/lib/changescan/yesterday",
                "exclusions": [
                    {"category": "Directory", "specifics": "/srv/www/tmp"},
                    {"category": "Pattern", "specifics": ".cache"}
                ]
            }"#,
        )
        .unwrap();

        let config: ScanConfiguration = ScanConfiguration::from_json_file(&path).unwrap();
        assert_eq!(config.starting_directory, PathBuf::from("/srv/www"));
        assert!(!config.is_scanless_comparison);
        assert!(config.save_requested());
        assert!(config.comparison_requested());
        assert!(!config.report_requested());
        assert_eq!(config.exclusions.len(), 2);
        assert_eq!(
            config.exclusions.rules()[0].category(),
            ExclusionCategory::Directory
        );
    }

    #[test]
    fn test_from_json_file_rejects_unknown_fields() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"rootDirectory": "/", "colour": "blue"}"#).unwrap();

        let result = ScanConfiguration::from_json_file(&path);
        assert!(matches!(result, Err(FileSystemError::InvalidConfig { .. })));
    }
}
