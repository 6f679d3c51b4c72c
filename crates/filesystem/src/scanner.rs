//! Recursive directory walker that builds a [`FileSystemSnapshot`].
//!
//! The walk is depth-first and pre-order. Within a directory every file is
//! processed before any subdirectory is descended into, both in enumeration
//! order. Per-file and per-directory failures are logged and skipped, so a
//! scan always yields a (possibly partial) snapshot.

use std::cell::Cell;
use std::cmp::Ordering as SortOrder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use changescan_common::{ProgressListener, ProgressListeners};
use walkdir::WalkDir;

use crate::descriptor::FileDescriptor;
use crate::error::FileSystemError;
use crate::exclusion::ExclusionSet;
use crate::snapshot::FileSystemSnapshot;

/// Statistics from a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Directories whose entries were enumerated.
    pub directories_scanned: u64,
    /// Files added to the snapshot.
    pub files_described: u64,
    /// Files skipped by an exclusion rule.
    pub files_excluded: u64,
    /// Directories skipped by an exclusion rule.
    pub directories_excluded: u64,
    /// Files that could not be described.
    pub files_failed: u64,
    /// Directories that could not be enumerated or processed.
    pub directories_failed: u64,
    /// Bytes covered by the described files.
    pub bytes_described: u64,
    /// Wall time of the walk.
    pub duration: Duration,
}

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Files found, keyed by path.
    pub snapshot: FileSystemSnapshot,
    /// Set when some directory listing was refused.
    pub admin_fault: bool,
    /// Set when the walk stopped early because the cancel flag was raised.
    pub cancelled: bool,
    /// Counters gathered during the walk.
    pub stats: ScanStats,
}

/// Kind of a non-directory entry, as reported without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Symlink,
    Other,
}

/// One step of a walk.
///
/// Directories arrive before their contents. A directory that cannot be
/// listed is followed by `ListingFailed` for the same path.
#[derive(Debug)]
pub(crate) enum WalkItem {
    Directory {
        path: PathBuf,
        depth: usize,
    },
    Entry {
        path: PathBuf,
        depth: usize,
        kind: EntryKind,
    },
    ListingFailed {
        path: PathBuf,
        error: std::io::Error,
    },
    EntryFailed {
        message: String,
    },
}

impl WalkItem {
    /// Convert one walkdir result.
    ///
    /// `last_directory` tracks the most recent directory so that an error
    /// carrying its path is recognised as a failure to list it.
    fn from_walk(
        result: walkdir::Result<walkdir::DirEntry>,
        last_directory: &mut Option<PathBuf>,
    ) -> Self {
        match result {
            Ok(entry) => {
                let depth: usize = entry.depth();
                let file_type: std::fs::FileType = entry.file_type();
                let path: PathBuf = entry.into_path();
                if file_type.is_dir() {
                    *last_directory = Some(path.clone());
                    WalkItem::Directory { path, depth }
                } else {
                    let kind: EntryKind = if file_type.is_symlink() {
                        EntryKind::Symlink
                    } else if file_type.is_file() {
                        EntryKind::File
                    } else {
                        EntryKind::Other
                    };
                    WalkItem::Entry { path, depth, kind }
                }
            }
            Err(e) => {
                let listing: Option<PathBuf> = e
                    .path()
                    .filter(|path: &&Path| last_directory.as_deref() == Some(*path))
                    .map(Path::to_path_buf);
                let message: String = e.to_string();
                match (listing, e.into_io_error()) {
                    (Some(path), Some(error)) => WalkItem::ListingFailed { path, error },
                    _ => WalkItem::EntryFailed { message },
                }
            }
        }
    }
}

/// Mutable state threaded through one walk.
struct ScanContext {
    started: Instant,
    snapshot: FileSystemSnapshot,
    admin_fault: bool,
    cancelled: bool,
    stats: ScanStats,
}

impl ScanContext {
    fn new(root: &Path) -> Self {
        Self {
            started: Instant::now(),
            snapshot: FileSystemSnapshot::for_root(root.to_string_lossy()),
            admin_fault: false,
            cancelled: false,
            stats: ScanStats::default(),
        }
    }
}

/// A directory whose contents are still arriving.
struct OpenDirectory {
    depth: usize,
    listed: bool,
}

/// Walks a directory tree and describes every file in it.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    exclusions: ExclusionSet,
    listeners: ProgressListeners,
    cancel: Option<Arc<AtomicBool>>,
}

impl DirectoryScanner {
    /// Create a scanner that prunes paths matched by `exclusions`.
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self {
            exclusions,
            listeners: ProgressListeners::new(),
            cancel: None,
        }
    }

    /// Replace the exclusion rules.
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Subscribe a progress listener.
    pub fn add_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.add(listener);
    }

    /// Stop the walk at the next file or directory boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Walk `root` and build a snapshot.
    ///
    /// Never fails: problems with individual entries are logged, counted in
    /// [`ScanStats`], and skipped. Listeners receive one tick per processed
    /// file or subdirectory and a single completion notice at the end.
    ///
    /// # Arguments
    /// * `root` - Directory to walk; its path prefixes every snapshot key
    pub fn scan(&self, root: &Path) -> ScanOutcome {
        let pruned: Cell<u64> = Cell::new(0);
        let mut context: ScanContext = ScanContext::new(root);

        if root.is_dir() {
            self.process(self.walk(root, &pruned), &mut context);
        } else {
            log::warn!("Declining non-existent folder {}", root.display());
            context.stats.directories_failed += 1;
        }
        context.stats.directories_excluded += pruned.get();

        self.finish(root, context)
    }

    /// Build a snapshot from an already produced sequence of walk items.
    pub(crate) fn scan_items<I>(&self, root: &Path, items: I) -> ScanOutcome
    where
        I: IntoIterator<Item = WalkItem>,
    {
        let mut context: ScanContext = ScanContext::new(root);
        self.process(items, &mut context);
        self.finish(root, context)
    }

    /// Walk `root` with files ahead of subdirectories, pruning excluded
    /// directories before they are descended into.
    fn walk<'a>(
        &'a self,
        root: &Path,
        pruned: &'a Cell<u64>,
    ) -> impl Iterator<Item = WalkItem> + 'a {
        let mut last_directory: Option<PathBuf> = None;
        WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a: &walkdir::DirEntry, b: &walkdir::DirEntry| -> SortOrder {
                a.file_type().is_dir().cmp(&b.file_type().is_dir())
            })
            .into_iter()
            .filter_entry(move |entry: &walkdir::DirEntry| !self.prunes(entry, pruned))
            .map(move |result: walkdir::Result<walkdir::DirEntry>| {
                WalkItem::from_walk(result, &mut last_directory)
            })
    }

    /// Whether `entry` is an excluded directory.
    fn prunes(&self, entry: &walkdir::DirEntry, pruned: &Cell<u64>) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let key = entry.path().to_string_lossy();
        if !self.exclusions.excludes(&key) {
            return false;
        }
        log::debug!("Excluding folder {}", key);
        pruned.set(pruned.get() + 1);
        true
    }

    fn process<I>(&self, items: I, context: &mut ScanContext)
    where
        I: IntoIterator<Item = WalkItem>,
    {
        let mut open: Vec<OpenDirectory> = Vec::new();

        for item in items {
            if self.check_cancelled(context) {
                break;
            }

            match item {
                WalkItem::Directory { path, depth } => {
                    self.close_directories(&mut open, depth, context, true);
                    log::debug!("Scanning {}", path.display());
                    open.push(OpenDirectory {
                        depth,
                        listed: true,
                    });
                }
                WalkItem::ListingFailed { path, error } => {
                    let error: FileSystemError =
                        FileSystemError::io(path.display().to_string(), error);
                    context.admin_fault = true;
                    context.stats.directories_failed += 1;
                    if let Some(directory) = open.last_mut() {
                        directory.listed = false;
                    }
                    if error.is_permission_denied() {
                        log::warn!("Denied access to folder {}", path.display());
                    } else {
                        log::warn!("Unable to list folder {}", error);
                    }
                }
                WalkItem::Entry { path, depth, kind } => {
                    self.close_directories(&mut open, depth, context, true);
                    self.scan_entry(&path, kind, context);
                }
                WalkItem::EntryFailed { message } => {
                    log::warn!("Skipping unreadable entry: {}", message);
                }
            }
        }

        let tick: bool = !context.cancelled;
        self.close_directories(&mut open, 0, context, tick);
    }

    /// Finish every open directory at `depth` or deeper.
    ///
    /// Each finished subdirectory is worth one tick; the root is not.
    fn close_directories(
        &self,
        open: &mut Vec<OpenDirectory>,
        depth: usize,
        context: &mut ScanContext,
        tick: bool,
    ) {
        while let Some(directory) = open.last() {
            if directory.depth < depth {
                break;
            }
            if directory.listed {
                context.stats.directories_scanned += 1;
            }
            if tick && directory.depth > 0 {
                self.listeners.tick();
            }
            open.pop();
        }
    }

    /// Describe a file or a symlink to one.
    ///
    /// Symlinks to directories are not followed, which keeps the walk free
    /// of cycles.
    fn scan_entry(&self, path: &Path, kind: EntryKind, context: &mut ScanContext) {
        match kind {
            EntryKind::File => {}
            EntryKind::Symlink => match std::fs::metadata(path) {
                Ok(target) if target.is_file() => {}
                Ok(target) if target.is_dir() => {
                    log::debug!("Not following directory symlink {}", path.display());
                    return;
                }
                Ok(_) => return,
                Err(e) => {
                    log::warn!("Skipping dangling symlink {}: {}", path.display(), e);
                    return;
                }
            },
            EntryKind::Other => return,
        }

        self.scan_file(path, context);
        self.listeners.tick();
    }

    /// Describe one file and add it to the snapshot, unless excluded.
    fn scan_file(&self, file: &Path, context: &mut ScanContext) {
        let key: String = file.to_string_lossy().into_owned();
        if self.exclusions.excludes(&key) {
            log::debug!("Excluding file {}", key);
            context.stats.files_excluded += 1;
            return;
        }

        match FileDescriptor::describe(file) {
            Ok(descriptor) => {
                context.stats.files_described += 1;
                context.stats.bytes_described += descriptor.size();
                context.snapshot.add(descriptor);
            }
            Err(e) => {
                context.stats.files_failed += 1;
                log::warn!("Unable to scan {}: {}", key, e);
            }
        }
    }

    fn finish(&self, root: &Path, mut context: ScanContext) -> ScanOutcome {
        self.listeners.conclude();

        context.stats.duration = context.started.elapsed();
        log::info!(
            "Scan of {} finished: {} files in {} directories ({} excluded, {} failed)",
            root.display(),
            context.stats.files_described,
            context.stats.directories_scanned,
            context.stats.files_excluded + context.stats.directories_excluded,
            context.stats.files_failed + context.stats.directories_failed,
        );

        ScanOutcome {
            snapshot: context.snapshot,
            admin_fault: context.admin_fault,
            cancelled: context.cancelled,
            stats: context.stats,
        }
    }

    fn check_cancelled(&self, context: &mut ScanContext) -> bool {
        if context.cancelled {
            return true;
        }
        let raised: bool = self
            .cancel
            .as_ref()
            .map(|flag: &Arc<AtomicBool>| flag.load(Ordering::SeqCst))
            .unwrap_or(false);
        if raised {
            log::warn!("Scan cancelled; the snapshot is incomplete");
            context.cancelled = true;
        }
        raised
    }
}
