//! Classification of differences between two snapshots.
//!
//! [`compare`] partitions every path of a baseline and a candidate snapshot
//! into exactly one of: new in the candidate, removed in the candidate,
//! changed (with a non-empty set of [`DifferenceKind`]s), or unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

use changescan_common::Checksum;

use crate::descriptor::FileDescriptor;
use crate::error::{ComparisonError, Side};
use crate::snapshot::FileSystemSnapshot;

/// One way two descriptions of the same file can differ.
///
/// Variants are ordered; a difference set iterates in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DifferenceKind {
    ChecksumDiffers,
    CandidateLarger,
    CandidateSmaller,
    CreationTimeCandidateMoreRecent,
    CreationTimeOriginalMoreRecent,
    LastAccessCandidateMoreRecent,
    LastAccessOriginalMoreRecent,
    LastWriteCandidateMoreRecent,
    LastWriteOriginalMoreRecent,
}

impl DifferenceKind {
    /// Human-readable description used in logs and reports.
    pub fn description(&self) -> &'static str {
        match self {
            DifferenceKind::ChecksumDiffers => "Checksum Differs",
            DifferenceKind::CandidateLarger => "Increased in size",
            DifferenceKind::CandidateSmaller => "Decreased in size",
            DifferenceKind::CreationTimeCandidateMoreRecent => "Latest file created more recently",
            DifferenceKind::CreationTimeOriginalMoreRecent => {
                "Original file created more recently"
            }
            DifferenceKind::LastAccessCandidateMoreRecent => "Latest file accessed more recently",
            DifferenceKind::LastAccessOriginalMoreRecent => "Original file accessed more recently",
            DifferenceKind::LastWriteCandidateMoreRecent => {
                "Latest file written to more recently"
            }
            DifferenceKind::LastWriteOriginalMoreRecent => {
                "Original file written to more recently"
            }
        }
    }

    /// Whether this kind reflects a change in content rather than a timestamp.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            DifferenceKind::ChecksumDiffers
                | DifferenceKind::CandidateLarger
                | DifferenceKind::CandidateSmaller
        )
    }
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Two descriptions of the same path, one from each snapshot.
#[derive(Debug, Clone)]
pub struct FileComparison {
    original: FileDescriptor,
    candidate: FileDescriptor,
    differences: OnceLock<BTreeSet<DifferenceKind>>,
}

impl FileComparison {
    /// Pair an original and a candidate description.
    ///
    /// # Errors
    /// Returns `MissingDescription` naming the absent side (original is
    /// checked first), or `PathMismatch` if the paths differ.
    pub fn new(
        original: Option<FileDescriptor>,
        candidate: Option<FileDescriptor>,
    ) -> Result<Self, ComparisonError> {
        let original: FileDescriptor = original.ok_or(ComparisonError::MissingDescription {
            side: Side::Original,
        })?;
        let candidate: FileDescriptor = candidate.ok_or(ComparisonError::MissingDescription {
            side: Side::Candidate,
        })?;
        if original.fully_qualified_path() != candidate.fully_qualified_path() {
            return Err(ComparisonError::PathMismatch {
                original: original.fully_qualified_path().to_string(),
                candidate: candidate.fully_qualified_path().to_string(),
            });
        }

        Ok(Self {
            original,
            candidate,
            differences: OnceLock::new(),
        })
    }

    /// Path shared by both descriptions.
    pub fn fully_qualified_path(&self) -> &str {
        self.original.fully_qualified_path()
    }

    /// Baseline description.
    pub fn original(&self) -> &FileDescriptor {
        &self.original
    }

    /// Newer description.
    pub fn candidate(&self) -> &FileDescriptor {
        &self.candidate
    }

    /// Ordered set of differences, computed on first use.
    pub fn differences(&self) -> &BTreeSet<DifferenceKind> {
        self.differences
            .get_or_init(|| classify(&self.original, &self.candidate))
    }

    /// Whether any difference was found.
    pub fn has_differences(&self) -> bool {
        !self.differences().is_empty()
    }

    /// Whether the checksum or size changed.
    pub fn content_was_changed(&self) -> bool {
        self.differences()
            .iter()
            .any(|kind: &DifferenceKind| kind.is_content())
    }

    /// Differences as a comma-separated description.
    pub fn describe_differences(&self) -> String {
        self.differences()
            .iter()
            .map(|kind: &DifferenceKind| kind.description())
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

/// Compute the difference set for two descriptions.
///
/// Creation times are compared only when both sides recorded one.
fn classify(original: &FileDescriptor, candidate: &FileDescriptor) -> BTreeSet<DifferenceKind> {
    let mut kinds: BTreeSet<DifferenceKind> = BTreeSet::new();

    if original.checksum() != candidate.checksum() {
        kinds.insert(DifferenceKind::ChecksumDiffers);
    }

    order_axis(
        &mut kinds,
        original.size(),
        candidate.size(),
        DifferenceKind::CandidateLarger,
        DifferenceKind::CandidateSmaller,
    );

    if let (Some(before), Some(after)) = (original.creation_time_us(), candidate.creation_time_us())
    {
        order_axis(
            &mut kinds,
            before,
            after,
            DifferenceKind::CreationTimeCandidateMoreRecent,
            DifferenceKind::CreationTimeOriginalMoreRecent,
        );
    }

    order_axis(
        &mut kinds,
        original.last_access_time_us(),
        candidate.last_access_time_us(),
        DifferenceKind::LastAccessCandidateMoreRecent,
        DifferenceKind::LastAccessOriginalMoreRecent,
    );

    order_axis(
        &mut kinds,
        original.last_write_time_us(),
        candidate.last_write_time_us(),
        DifferenceKind::LastWriteCandidateMoreRecent,
        DifferenceKind::LastWriteOriginalMoreRecent,
    );

    kinds
}

fn order_axis<T: Ord>(
    kinds: &mut BTreeSet<DifferenceKind>,
    original: T,
    candidate: T,
    candidate_greater: DifferenceKind,
    original_greater: DifferenceKind,
) {
    match candidate.cmp(&original) {
        std::cmp::Ordering::Greater => {
            kinds.insert(candidate_greater);
        }
        std::cmp::Ordering::Less => {
            kinds.insert(original_greater);
        }
        std::cmp::Ordering::Equal => {}
    }
}

/// A removed file whose content reappeared under a new path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedFile<'a> {
    /// Description from the baseline.
    pub original: &'a FileDescriptor,
    /// Description from the candidate.
    pub candidate: &'a FileDescriptor,
}

/// Outcome of comparing a baseline snapshot with a candidate snapshot.
///
/// The three maps are disjoint. Paths present in both snapshots without
/// differences appear in none of them.
#[derive(Debug, Clone, Default)]
pub struct FileSystemComparison {
    /// Paths present only in the candidate.
    pub new_to_candidate: BTreeMap<String, FileDescriptor>,
    /// Paths present only in the baseline.
    pub removed_in_candidate: BTreeMap<String, FileDescriptor>,
    /// Paths present in both with at least one difference.
    pub file_system_differences: BTreeMap<String, FileComparison>,
}

impl FileSystemComparison {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.new_to_candidate.is_empty()
            && self.removed_in_candidate.is_empty()
            && self.file_system_differences.is_empty()
    }

    /// Total number of reported paths.
    pub fn change_count(&self) -> usize {
        self.new_to_candidate.len()
            + self.removed_in_candidate.len()
            + self.file_system_differences.len()
    }

    /// Changed files whose checksum or size differs.
    pub fn content_changes(&self) -> impl Iterator<Item = &FileComparison> {
        self.file_system_differences
            .values()
            .filter(|c: &&FileComparison| c.content_was_changed())
    }

    /// Changed files whose content is intact but whose timestamps differ.
    pub fn timestamp_changes(&self) -> impl Iterator<Item = &FileComparison> {
        self.file_system_differences
            .values()
            .filter(|c: &&FileComparison| !c.content_was_changed())
    }

    /// Pair removed files with new files holding identical content.
    ///
    /// Each new file is paired at most once. This is a view over the
    /// partition; moved files still appear as removed and new.
    pub fn moved_candidates(&self) -> Vec<MovedFile<'_>> {
        let mut by_content: HashMap<(Checksum, u64), Vec<&FileDescriptor>> = HashMap::new();
        for descriptor in self.new_to_candidate.values().rev() {
            by_content
                .entry((descriptor.checksum(), descriptor.size()))
                .or_default()
                .push(descriptor);
        }

        let mut moved: Vec<MovedFile<'_>> = Vec::new();
        for original in self.removed_in_candidate.values() {
            if let Some(pool) = by_content.get_mut(&(original.checksum(), original.size())) {
                if let Some(candidate) = pool.pop() {
                    moved.push(MovedFile {
                        original,
                        candidate,
                    });
                }
            }
        }
        moved
    }
}

/// Diff a candidate snapshot against a baseline.
///
/// Both snapshots are consumed: each baseline path is looked up and removed
/// from the candidate, and whatever remains in the candidate is new.
///
/// # Arguments
/// * `baseline` - The earlier snapshot
/// * `candidate` - The newer snapshot
pub fn compare(baseline: FileSystemSnapshot, mut candidate: FileSystemSnapshot) -> FileSystemComparison {
    let mut comparison: FileSystemComparison = FileSystemComparison::default();

    for original in baseline {
        let path: String = original.fully_qualified_path().to_string();
        match candidate.lookup_and_remove(&path) {
            None => {
                log::debug!("Removed: {}", path);
                comparison.removed_in_candidate.insert(path, original);
            }
            Some(current) => {
                // Both descriptors come from entries keyed by the same path.
                let pair: FileComparison = match FileComparison::new(Some(original), Some(current))
                {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("Skipping {}: {}", path, e);
                        continue;
                    }
                };
                if pair.has_differences() {
                    log::debug!("Changed: {} ({})", path, pair.describe_differences());
                    comparison.file_system_differences.insert(path, pair);
                }
            }
        }
    }

    for current in candidate {
        log::debug!("New: {}", current.fully_qualified_path());
        comparison
            .new_to_candidate
            .insert(current.fully_qualified_path().to_string(), current);
    }

    log::info!(
        "Comparison found {} new, {} removed, {} changed",
        comparison.new_to_candidate.len(),
        comparison.removed_in_candidate.len(),
        comparison.file_system_differences.len()
    );

    comparison
}
