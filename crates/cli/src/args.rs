//! Command-line arguments.

use std::path::{Path, PathBuf};

use changescan_common::{with_required_extension, REPORT_EXTENSION};
use changescan_filesystem::{ExclusionRule, FileSystemError, ScanConfiguration};
use clap::Parser;

/// Pattern excluded from every scan unless `--no-default-exclusions` is given.
pub const DEFAULT_EXCLUDED_PATTERN: &str = "$Recycle.Bin";

/// Snapshot a directory tree and report what changed since an earlier snapshot
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "changescan",
    version,
    about = "Snapshot a directory tree and report what changed since an earlier snapshot",
    after_help = "EXAMPLES:\n    \
        changescan --root /srv/www --save monday\n    \
        changescan --root /srv/www --save tuesday --compare monday --report changes\n    \
        changescan --use tuesday --compare monday --report changes\n    \
        changescan --root /srv --exclude-pattern node_modules --exclude-glob '**/*.log'"
)]
pub struct CliArgs {
    /// Directory to scan (defaults to the home folder, or C:\ on Windows)
    #[arg(short = 'r', long, value_name = "DIR", conflicts_with = "use_snapshot")]
    pub root: Option<PathBuf>,

    /// Save the scan as a snapshot (.fsc is appended)
    #[arg(short = 's', long, value_name = "FILE", conflicts_with = "use_snapshot")]
    pub save: Option<PathBuf>,

    /// Baseline snapshot to compare against
    #[arg(short = 'c', long, value_name = "FILE")]
    pub compare: Option<PathBuf>,

    /// Skip scanning and use this stored snapshot as the current state
    #[arg(short = 'u', long = "use", value_name = "FILE", requires = "compare")]
    pub use_snapshot: Option<PathBuf>,

    /// Write an HTML change report (.html is appended)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Exclude exactly this directory and everything below it (can be repeated)
    #[arg(long = "exclude-dir", value_name = "DIR", action = clap::ArgAction::Append)]
    pub exclude_dirs: Vec<String>,

    /// Exclude exactly this file (can be repeated)
    #[arg(long = "exclude-file", value_name = "FILE", action = clap::ArgAction::Append)]
    pub exclude_files: Vec<String>,

    /// Exclude every path containing this text (can be repeated)
    #[arg(long = "exclude-pattern", value_name = "TEXT", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Exclude every path matching this glob (can be repeated)
    #[arg(long = "exclude-glob", value_name = "GLOB", action = clap::ArgAction::Append)]
    pub exclude_globs: Vec<String>,

    /// Do not exclude $Recycle.Bin
    #[arg(long)]
    pub no_default_exclusions: bool,

    /// JSON run configuration; flags given on the command line take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (show every file examined)
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode - only warnings and errors, no progress display
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the arguments into a run configuration.
    ///
    /// Values from `--config` are loaded first and then overridden by any
    /// flag given explicitly. Exclusions accumulate from both.
    ///
    /// # Errors
    /// Returns error if the configuration file cannot be loaded or a glob
    /// does not compile.
    pub fn into_configuration(self) -> Result<ScanConfiguration, FileSystemError> {
        let mut config: ScanConfiguration = match &self.config {
            Some(path) => ScanConfiguration::from_json_file(path)?,
            None => ScanConfiguration::default(),
        };

        if let Some(current) = self.use_snapshot {
            config.is_scanless_comparison = true;
            config.snapshot_save_path = Some(current);
        } else if let Some(save) = self.save {
            config.snapshot_save_path = Some(save);
        }

        if let Some(root) = self.root {
            config.starting_directory = root;
        } else if config.starting_directory.as_os_str().is_empty()
            && !config.is_scanless_comparison
        {
            config.starting_directory = default_root();
        }

        if let Some(baseline) = self.compare {
            config.snapshot_comparison_path = Some(baseline);
        }
        config.report_path = self
            .report
            .or(config.report_path.take())
            .map(|path: PathBuf| with_required_extension(&path, REPORT_EXTENSION));

        if !self.no_default_exclusions {
            config.exclusions.push(ExclusionRule::pattern(DEFAULT_EXCLUDED_PATTERN));
        }
        for dir in self.exclude_dirs {
            config.exclusions.push(ExclusionRule::directory(dir));
        }
        for file in self.exclude_files {
            config.exclusions.push(ExclusionRule::file(file));
        }
        for pattern in self.exclude_patterns {
            config.exclusions.push(ExclusionRule::pattern(pattern));
        }
        for glob in self.exclude_globs {
            config.exclusions.push(ExclusionRule::glob(glob)?);
        }

        Ok(config)
    }
}

/// Root scanned when none is given.
fn default_root() -> PathBuf {
    if cfg!(windows) {
        return PathBuf::from("C:\\");
    }
    dirs::home_dir().unwrap_or_else(|| Path::new("/").to_path_buf())
}
