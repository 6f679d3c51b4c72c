//! Exclusion rules that prune paths from a scan.
//!
//! A rule has a category and a `specifics` string:
//! - `Directory` matches only a directory whose path equals `specifics` exactly
//! - `File` matches only a regular file whose path equals `specifics` exactly
//! - `Pattern` matches any path containing `specifics` as a substring
//! - `Glob` matches any path accepted by the glob `specifics`
//!
//! Exact comparisons are case-sensitive on every platform.

use std::fmt;
use std::path::Path;

use changescan_common::{lexical_normalize, to_absolute};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::FileSystemError;

/// Kind of match an exclusion rule performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExclusionCategory {
    /// Exact path of a directory.
    #[serde(alias = "directory", alias = "DIRECTORY", alias = "folder", alias = "FOLDER")]
    Directory,
    /// Exact path of a regular file.
    #[serde(alias = "file", alias = "FILE")]
    File,
    /// Substring anywhere in the path.
    #[default]
    #[serde(alias = "pattern", alias = "PATTERN")]
    Pattern,
    /// Glob over the full path.
    #[serde(alias = "glob", alias = "GLOB")]
    Glob,
}

impl fmt::Display for ExclusionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            ExclusionCategory::Directory => "Directory",
            ExclusionCategory::File => "File",
            ExclusionCategory::Pattern => "Pattern",
            ExclusionCategory::Glob => "Glob",
        };
        f.write_str(name)
    }
}

/// Serialized form of an exclusion rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExclusionRuleDocument {
    #[serde(default)]
    category: ExclusionCategory,
    specifics: String,
}

/// Predicate deciding whether a path is skipped during scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ExclusionRuleDocument", into = "ExclusionRuleDocument")]
pub struct ExclusionRule {
    category: ExclusionCategory,
    specifics: String,
    /// Compiled matcher, present only for `Glob`.
    matcher: Option<GlobMatcher>,
}

impl ExclusionRule {
    /// Create a rule of any category.
    ///
    /// # Arguments
    /// * `category` - How `specifics` is interpreted
    /// * `specifics` - Exact path, substring, or glob
    ///
    /// # Errors
    /// Returns error if a `Glob` rule's pattern does not compile.
    pub fn new(
        category: ExclusionCategory,
        specifics: impl Into<String>,
    ) -> Result<Self, FileSystemError> {
        let specifics: String = specifics.into();
        let matcher: Option<GlobMatcher> = match category {
            ExclusionCategory::Glob => {
                let glob: Glob =
                    Glob::new(&specifics).map_err(|e| FileSystemError::InvalidGlobPattern {
                        pattern: specifics.clone(),
                        reason: e.to_string(),
                    })?;
                Some(glob.compile_matcher())
            }
            _ => None,
        };

        Ok(Self {
            category,
            specifics,
            matcher,
        })
    }

    /// Exclude exactly one directory (and therefore its subtree).
    pub fn directory(path: impl Into<String>) -> Self {
        Self::literal(ExclusionCategory::Directory, path.into())
    }

    /// Exclude exactly one file.
    pub fn file(path: impl Into<String>) -> Self {
        Self::literal(ExclusionCategory::File, path.into())
    }

    /// Exclude every path containing `substring`.
    pub fn pattern(substring: impl Into<String>) -> Self {
        Self::literal(ExclusionCategory::Pattern, substring.into())
    }

    /// Exclude every path matching a glob.
    ///
    /// # Errors
    /// Returns error if the pattern does not compile.
    pub fn glob(pattern: impl Into<String>) -> Result<Self, FileSystemError> {
        Self::new(ExclusionCategory::Glob, pattern)
    }

    fn literal(category: ExclusionCategory, specifics: String) -> Self {
        Self {
            category,
            specifics,
            matcher: None,
        }
    }

    /// The rule's category.
    pub fn category(&self) -> ExclusionCategory {
        self.category
    }

    /// The rule's path, substring, or glob.
    pub fn specifics(&self) -> &str {
        &self.specifics
    }

    /// This rule with a `Directory` or `File` path made absolute and
    /// lexically normalized, the same way a scan root is.
    ///
    /// Other categories are returned unchanged.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn resolved(&self) -> Result<Self, FileSystemError> {
        match self.category {
            ExclusionCategory::Directory | ExclusionCategory::File => {
                let absolute: std::path::PathBuf = to_absolute(Path::new(&self.specifics))?;
                let normalized: String = lexical_normalize(&absolute).to_string_lossy().into_owned();
                Ok(Self::literal(self.category, normalized))
            }
            ExclusionCategory::Pattern | ExclusionCategory::Glob => Ok(self.clone()),
        }
    }

    /// Whether this rule excludes `candidate`.
    ///
    /// `Directory` and `File` rules consult the filesystem to learn the
    /// candidate's kind, following symlinks.
    pub fn matches(&self, candidate: &str) -> bool {
        match self.category {
            ExclusionCategory::Directory => {
                candidate == self.specifics && Path::new(candidate).is_dir()
            }
            ExclusionCategory::File => {
                candidate == self.specifics && Path::new(candidate).is_file()
            }
            ExclusionCategory::Pattern => candidate.contains(&self.specifics),
            ExclusionCategory::Glob => self
                .matcher
                .as_ref()
                .map(|m: &GlobMatcher| m.is_match(candidate))
                .unwrap_or(false),
        }
    }
}

impl PartialEq for ExclusionRule {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.specifics == other.specifics
    }
}

impl Eq for ExclusionRule {}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.specifics)
    }
}

impl TryFrom<ExclusionRuleDocument> for ExclusionRule {
    type Error = FileSystemError;

    fn try_from(document: ExclusionRuleDocument) -> Result<Self, Self::Error> {
        ExclusionRule::new(document.category, document.specifics)
    }
}

impl From<ExclusionRule> for ExclusionRuleDocument {
    fn from(rule: ExclusionRule) -> Self {
        ExclusionRuleDocument {
            category: rule.category,
            specifics: rule.specifics,
        }
    }
}

/// Ordered list of exclusion rules.
///
/// A path is excluded when any rule matches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    rules: Vec<ExclusionRule>,
}

impl ExclusionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn push(&mut self, rule: ExclusionRule) {
        self.rules.push(rule);
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether any rule excludes `candidate`.
    pub fn excludes(&self, candidate: &str) -> bool {
        self.rules.iter().any(|rule: &ExclusionRule| rule.matches(candidate))
    }
}

impl From<Vec<ExclusionRule>> for ExclusionSet {
    fn from(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }
}

impl FromIterator<ExclusionRule> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = ExclusionRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
