//! End-to-end change-scan run: scan or load, save, compare, report.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use changescan_common::ProgressListener;

use crate::compare::{compare, FileSystemComparison};
use crate::config::ScanConfiguration;
use crate::error::{FileSystemError, ReportError};
use crate::scanner::{DirectoryScanner, ScanOutcome, ScanStats};
use crate::snapshot::FileSystemSnapshot;

/// Final warning emitted when some directory could not be listed.
pub const ADMIN_FAULT_WARNING: &str = "YOU MAY NEED TO RE-RUN WITH ADMINISTRATIVE PRIVILEGES!";

/// Produces the current snapshot of a root directory.
pub(crate) type ScanFn<'a> = dyn Fn(&DirectoryScanner, &Path) -> ScanOutcome + 'a;

/// Renders a comparison to a destination.
pub trait ReportGenerator {
    /// Short name used in log lines.
    fn name(&self) -> &str {
        "report"
    }

    /// Write a report for `comparison` to `destination`.
    ///
    /// # Errors
    /// Returns error if the report cannot be produced or written.
    fn generate(
        &self,
        comparison: &FileSystemComparison,
        destination: &Path,
    ) -> Result<(), ReportError>;
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// The run's current snapshot, scanned or loaded.
    pub snapshot: Option<FileSystemSnapshot>,
    /// Where the fresh scan was saved.
    pub saved_to: Option<PathBuf>,
    /// Result of comparing against the baseline.
    pub comparison: Option<FileSystemComparison>,
    /// Set when some directory listing was refused.
    pub admin_fault: bool,
    /// Set when the scan was cancelled; nothing after the scan ran.
    pub cancelled: bool,
    /// Scan counters, absent in scanless mode.
    pub stats: Option<ScanStats>,
    /// Fatal error that ended the run early.
    pub failure: Option<String>,
    /// Number of report generators that succeeded.
    pub reports_generated: usize,
    /// Errors from report generators, prefixed with the generator name.
    pub report_failures: Vec<String>,
}

impl RunSummary {
    /// Whether the run finished without a fatal error or failed report.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.report_failures.is_empty() && !self.cancelled
    }
}

/// Drives one run according to a [`ScanConfiguration`].
pub struct ChangeScanner {
    config: ScanConfiguration,
    scanner: DirectoryScanner,
    report_generators: Vec<Box<dyn ReportGenerator>>,
}

impl ChangeScanner {
    /// Create a runner for `config`.
    pub fn new(config: ScanConfiguration) -> Self {
        Self {
            config,
            scanner: DirectoryScanner::default(),
            report_generators: Vec::new(),
        }
    }

    /// The configuration this runner executes.
    pub fn config(&self) -> &ScanConfiguration {
        &self.config
    }

    /// Subscribe a progress listener to the scan.
    pub fn add_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.scanner.add_listener(listener);
    }

    /// Register a report generator. Each is invoked at most once per run.
    pub fn add_report_generator(&mut self, generator: Box<dyn ReportGenerator>) {
        self.report_generators.push(generator);
    }

    /// Stop the scan early once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.scanner = self.scanner.with_cancel_flag(flag);
        self
    }

    /// Execute the run.
    ///
    /// Never fails: a fatal error is logged once and recorded in
    /// [`RunSummary::failure`], and later steps are skipped.
    pub fn run(&self) -> RunSummary {
        self.run_with(&|scanner: &DirectoryScanner, root: &Path| scanner.scan(root))
    }

    /// Execute the run, producing the current snapshot with `scan`.
    pub(crate) fn run_with(&self, scan: &ScanFn<'_>) -> RunSummary {
        let mut summary: RunSummary = RunSummary::default();

        if let Err(e) = self.execute(&mut summary, scan) {
            log::error!("Change scan failed: {}", e);
            summary.failure = Some(e.to_string());
        }

        if summary.admin_fault {
            log::error!("{}", ADMIN_FAULT_WARNING);
        }

        summary
    }

    fn execute(&self, summary: &mut RunSummary, scan: &ScanFn<'_>) -> Result<(), FileSystemError> {
        self.config.validate()?;
        self.config.describe();

        let current: FileSystemSnapshot = if self.config.is_scanless_comparison {
            self.load_current()?
        } else {
            let root: PathBuf = self.config.resolved_root()?;
            let scanner: DirectoryScanner = self
                .scanner
                .clone()
                .with_exclusions(self.config.resolved_exclusions()?);
            let outcome: ScanOutcome = scan(&scanner, &root);
            summary.admin_fault = outcome.admin_fault;
            summary.cancelled = outcome.cancelled;
            summary.stats = Some(outcome.stats);

            if outcome.cancelled {
                log::warn!("Scan was cancelled; skipping save, comparison and report");
                summary.snapshot = Some(outcome.snapshot);
                return Ok(());
            }

            if let Some(path) = &self.config.snapshot_save_path {
                let written: PathBuf = outcome.snapshot.save(path)?;
                log::info!("Saved snapshot of {} files to {}", outcome.snapshot.len(), written.display());
                summary.saved_to = Some(written);
            }
            outcome.snapshot
        };

        if let Some(path) = &self.config.snapshot_comparison_path {
            log::info!("Loading baseline snapshot {}", path.display());
            let baseline: FileSystemSnapshot = FileSystemSnapshot::load(path)?;
            summary.comparison = Some(compare(baseline, current.clone()));
        }
        summary.snapshot = Some(current);

        if let (Some(destination), Some(comparison)) =
            (&self.config.report_path, &summary.comparison)
        {
            for generator in &self.report_generators {
                match generator.generate(comparison, destination) {
                    Ok(()) => {
                        log::info!("Wrote {} to {}", generator.name(), destination.display());
                        summary.reports_generated += 1;
                    }
                    Err(e) => {
                        log::error!("Unable to generate {}: {}", generator.name(), e);
                        summary
                            .report_failures
                            .push(format!("{}: {}", generator.name(), e));
                    }
                }
            }
        } else if self.config.report_requested() {
            log::warn!("A report was requested but no comparison was made");
        }

        Ok(())
    }

    /// Load the stored snapshot standing in for a scan in scanless mode.
    fn load_current(&self) -> Result<FileSystemSnapshot, FileSystemError> {
        let path: &Path = self.config.snapshot_save_path.as_deref().ok_or_else(|| {
            FileSystemError::config("scanless comparison needs a stored snapshot")
        })?;
        log::info!("Loading stored scan {}", path.display());
        FileSystemSnapshot::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DifferenceKind;
    use crate::exclusion::ExclusionRule;
    use crate::scanner::{EntryKind, WalkItem};
    use std::sync::Mutex;
    use std::thread::ThreadId;
    use tempfile::TempDir;

    /// Records every log message together with the thread that emitted it.
    struct CapturingLogger {
        records: Mutex<Vec<(ThreadId, String)>>,
    }

    impl log::Log for CapturingLogger {
        fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            if let Ok(mut records) = self.records.lock() {
                records.push((std::thread::current().id(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger {
        records: Mutex::new(Vec::new()),
    };

    fn capture_logs() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    }

    /// Messages logged on this thread, skipping the first `skip`.
    fn messages_from_this_thread(skip: usize) -> Vec<String> {
        let current: ThreadId = std::thread::current().id();
        LOGGER
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(thread, _)| *thread == current)
            .map(|(_, message)| message.clone())
            .skip(skip)
            .collect()
    }

    struct RecordingGenerator {
        calls: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl ReportGenerator for RecordingGenerator {
        fn generate(
            &self,
            _comparison: &FileSystemComparison,
            destination: &Path,
        ) -> Result<(), ReportError> {
            self.calls.lock().unwrap().push(destination.to_path_buf());
            Ok(())
        }
    }

    struct FailingGenerator;

    impl ReportGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "broken report"
        }

        fn generate(&self, _: &FileSystemComparison, _: &Path) -> Result<(), ReportError> {
            Err(ReportError::Other {
                message: "disk full".to_string(),
            })
        }
    }

    #[test]
    fn test_scan_and_save() {
        let tree: TempDir = TempDir::new().unwrap();
        std::fs::write(tree.path().join("a.txt"), b"a").unwrap();
        let store: TempDir = TempDir::new().unwrap();

        let config: ScanConfiguration =
            ScanConfiguration::new(tree.path()).with_save_path(store.path().join("today"));
        let summary: RunSummary = ChangeScanner::new(config).run();

        assert!(summary.succeeded());
        assert_eq!(summary.saved_to, Some(store.path().join("today.fsc")));
        assert_eq!(summary.snapshot.as_ref().map(|s| s.len()), Some(1));
        assert!(summary.comparison.is_none());
    }

    #[test]
    fn test_missing_baseline_is_fatal_and_skips_report() {
        let tree: TempDir = TempDir::new().unwrap();
        std::fs::write(tree.path().join("a.txt"), b"a").unwrap();

        let calls: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let config: ScanConfiguration = ScanConfiguration::new(tree.path())
            .with_comparison_path(tree.path().join("missing"))
            .with_report_path(tree.path().join("report.html"));
        let mut runner: ChangeScanner = ChangeScanner::new(config);
        runner.add_report_generator(Box::new(RecordingGenerator {
            calls: calls.clone(),
        }));
        let summary: RunSummary = runner.run();

        assert!(summary.failure.is_some());
        assert!(summary.comparison.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_configuration_is_reported() {
        let mut config: ScanConfiguration = ScanConfiguration::scanless("/a", "/b");
        config.snapshot_save_path = None;
        let summary: RunSummary = ChangeScanner::new(config).run();

        assert!(summary.failure.is_some());
        assert!(summary.snapshot.is_none());
    }

    #[test]
    fn test_report_failures_are_collected() {
        let tree: TempDir = TempDir::new().unwrap();
        std::fs::write(tree.path().join("a.txt"), b"a").unwrap();
        let baseline: PathBuf = FileSystemSnapshot::new()
            .save(&tree.path().join("empty"))
            .unwrap();

        let calls: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let config: ScanConfiguration = ScanConfiguration::new(tree.path())
            .with_comparison_path(&baseline)
            .with_report_path(tree.path().join("report.html"));
        let mut runner: ChangeScanner = ChangeScanner::new(config);
        runner.add_report_generator(Box::new(FailingGenerator));
        runner.add_report_generator(Box::new(RecordingGenerator {
            calls: calls.clone(),
        }));
        let summary: RunSummary = runner.run();

        assert!(summary.failure.is_none());
        assert_eq!(summary.reports_generated, 1);
        assert_eq!(summary.report_failures, vec!["broken report: disk full".to_string()]);
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(!summary.succeeded());

        // The baseline was empty, so the tree's files are all new.
        let comparison: &FileSystemComparison = summary.comparison.as_ref().unwrap();
        assert!(comparison.removed_in_candidate.is_empty());
        assert!(comparison.file_system_differences.is_empty());
        assert!(!comparison.new_to_candidate.is_empty());
    }

    #[test]
    fn test_refused_listings_warn_once_at_the_end() {
        capture_logs();
        let earlier: usize = messages_from_this_thread(0).len();
        let tree: TempDir = TempDir::new().unwrap();
        let open: PathBuf = tree.path().join("open");
        std::fs::create_dir(&open).unwrap();
        std::fs::write(open.join("kept.txt"), b"kept").unwrap();
        let first: PathBuf = tree.path().join("first");
        let second: PathBuf = tree.path().join("second");

        let refused = |path: &Path| WalkItem::ListingFailed {
            path: path.to_path_buf(),
            error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let runner: ChangeScanner = ChangeScanner::new(ScanConfiguration::new(tree.path()));
        let summary: RunSummary = runner.run_with(&|scanner: &DirectoryScanner, root: &Path| {
            scanner.scan_items(
                root,
                vec![
                    WalkItem::Directory { path: root.to_path_buf(), depth: 0 },
                    WalkItem::Directory { path: first.clone(), depth: 1 },
                    refused(&first),
                    WalkItem::Directory { path: second.clone(), depth: 1 },
                    refused(&second),
                    WalkItem::Directory { path: open.clone(), depth: 1 },
                    WalkItem::Entry {
                        path: open.join("kept.txt"),
                        depth: 2,
                        kind: EntryKind::File,
                    },
                ],
            )
        });

        assert!(summary.admin_fault);
        assert!(summary.succeeded());
        let snapshot: &FileSystemSnapshot = summary.snapshot.as_ref().unwrap();
        assert!(snapshot.contains(&open.join("kept.txt").to_string_lossy()));

        let messages: Vec<String> = messages_from_this_thread(earlier);
        let denials: usize = messages
            .iter()
            .filter(|m: &&String| m.starts_with("Denied access to folder"))
            .count();
        let warnings: usize = messages
            .iter()
            .filter(|m: &&String| m.as_str() == ADMIN_FAULT_WARNING)
            .count();
        assert_eq!(denials, 2);
        assert_eq!(warnings, 1);
        assert_eq!(messages.last().map(String::as_str), Some(ADMIN_FAULT_WARNING));
    }

    #[test]
    fn test_clean_run_has_no_privilege_warning() {
        capture_logs();
        let earlier: usize = messages_from_this_thread(0).len();
        let tree: TempDir = TempDir::new().unwrap();
        std::fs::write(tree.path().join("a.txt"), b"a").unwrap();

        let summary: RunSummary = ChangeScanner::new(ScanConfiguration::new(tree.path())).run();

        assert!(!summary.admin_fault);
        assert!(!messages_from_this_thread(earlier)
            .iter()
            .any(|m: &String| m.as_str() == ADMIN_FAULT_WARNING));
    }

    #[test]
    fn test_exact_path_exclusions_are_normalized_like_the_root() {
        let tree: TempDir = TempDir::new().unwrap();
        let site: PathBuf = tree.path().join("site");
        std::fs::create_dir_all(site.join("cache")).unwrap();
        std::fs::write(site.join("keep.txt"), b"keep").unwrap();
        std::fs::write(site.join("secret.txt"), b"secret").unwrap();
        std::fs::write(site.join("cache/blob"), b"blob").unwrap();

        let config: ScanConfiguration = ScanConfiguration::new(tree.path().join("./site/"))
            .with_exclusion(ExclusionRule::file(
                site.join("../site/./secret.txt").to_string_lossy(),
            ))
            .with_exclusion(ExclusionRule::directory(
                site.join("cache/").to_string_lossy(),
            ));
        let summary: RunSummary = ChangeScanner::new(config).run();

        let kept: String = site.join("keep.txt").to_string_lossy().into_owned();
        let snapshot: &FileSystemSnapshot = summary.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.sorted_paths(), vec![kept.as_str()]);
    }

    #[test]
    fn test_scanless_compares_stored_snapshots() {
        let tree: TempDir = TempDir::new().unwrap();
        let file: PathBuf = tree.path().join("a.txt");
        std::fs::write(&file, b"before").unwrap();
        let before: FileSystemSnapshot = DirectoryScanner::default().scan(tree.path()).snapshot;
        let before_path: PathBuf = before.save(&tree.path().join("before")).unwrap();

        std::fs::write(&file, b"after, and longer").unwrap();
        let after: FileSystemSnapshot = DirectoryScanner::default().scan(tree.path()).snapshot;
        let after_path: PathBuf = after.save(&tree.path().join("after")).unwrap();

        let summary: RunSummary =
            ChangeScanner::new(ScanConfiguration::scanless(&after_path, &before_path)).run();

        assert!(summary.succeeded());
        assert!(summary.stats.is_none());
        assert!(summary.saved_to.is_none());
        let comparison: &FileSystemComparison = summary.comparison.as_ref().unwrap();
        let key: String = file.to_string_lossy().into_owned();
        let changed = comparison.file_system_differences.get(&key).unwrap();
        assert!(changed.differences().contains(&DifferenceKind::ChecksumDiffers));
        assert!(changed.differences().contains(&DifferenceKind::CandidateLarger));
    }
}
