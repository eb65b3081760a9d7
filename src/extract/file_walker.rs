//! Source discovery with gitignore support
//!
//! Walks a source root and yields the Rust files that match the configured
//! include and exclude globs. Globs are matched against the path relative to
//! the root. Rust files are recognised with ripgrep's type definitions from
//! the `ignore` crate.

use crate::types::GlobPattern;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use ignore::types::{Types, TypesBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during file walking
#[derive(Debug, Error)]
pub enum FileWalkerError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),
}

/// Reason why a file was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// File did not match the include patterns, or matched an exclude
    ExcludedByPattern,
    /// File is not Rust source
    NotRust,
    /// Entry is not a regular file
    NotAFile,
}

/// Result of file walking: a file to extract from, or a skipped entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkResult {
    File(FileEntry),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// A discovered Rust source file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileEntry {
    /// Path as produced by the walk
    pub path: PathBuf,
    /// Path relative to the walk root
    pub relative: PathBuf,
}

/// Iterator factory over discovered source files
pub struct FileWalker {
    root: PathBuf,
    include_set: Option<GlobSet>,
    exclude_set: GlobSet,
    rust: Option<Types>,
    verbose: bool,
}

impl FileWalker {
    /// Creates a new FileWalker
    ///
    /// # Arguments
    /// * `root` - Root directory to walk
    /// * `include` - Include patterns (empty means include all)
    /// * `exclude` - Exclude patterns (applied after include)
    pub fn new(
        root: &Path,
        include: &[GlobPattern],
        exclude: &[GlobPattern],
    ) -> Result<Self, FileWalkerError> {
        Self::with_verbose(root, include, exclude, false)
    }

    /// Creates a new FileWalker that also reports skipped entries
    pub fn with_verbose(
        root: &Path,
        include: &[GlobPattern],
        exclude: &[GlobPattern],
        verbose: bool,
    ) -> Result<Self, FileWalkerError> {
        let include_set = if include.is_empty() {
            None
        } else {
            Some(Self::build_globset(include)?)
        };

        let mut exclude_patterns = Vec::from(exclude);
        exclude_patterns.push(GlobPattern::new("**/.git/**"));
        exclude_patterns.push(GlobPattern::new("**/target/**"));
        let exclude_set = Self::build_globset(&exclude_patterns)?;

        Ok(Self {
            root: root.to_path_buf(),
            include_set,
            exclude_set,
            rust: rust_types(),
            verbose,
        })
    }

    fn build_globset(patterns: &[GlobPattern]) -> Result<GlobSet, FileWalkerError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_str()).map_err(|e| FileWalkerError::InvalidGlob {
                pattern: pattern.as_str().to_string(),
                source: e,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| FileWalkerError::InvalidGlob {
            pattern: "<globset>".to_string(),
            source: e,
        })
    }

    /// Walks the tree and yields matching files
    pub fn walk(self) -> impl Iterator<Item = Result<FileEntry, FileWalkerError>> {
        self.walk_with_skip_info().filter_map(|result| match result {
            Ok(WalkResult::File(file)) => Some(Ok(file)),
            Ok(WalkResult::Skipped { .. }) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// Walks the tree, also yielding skipped entries when verbose
    pub fn walk_with_skip_info(self) -> impl Iterator<Item = Result<WalkResult, FileWalkerError>> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .build();
        let Self {
            root,
            include_set,
            exclude_set,
            rust,
            verbose,
        } = self;

        walker.filter_map(move |result| {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => return Some(Err(FileWalkerError::Walk(e))),
            };
            let path = entry.path();
            let skip = |reason| {
                verbose.then(|| {
                    Ok(WalkResult::Skipped {
                        path: path.to_path_buf(),
                        reason,
                    })
                })
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return skip(SkipReason::NotAFile);
            }

            let relative = path.strip_prefix(&root).unwrap_or(path);
            if let Some(include_set) = &include_set
                && !include_set.is_match(relative)
            {
                return skip(SkipReason::ExcludedByPattern);
            }
            if exclude_set.is_match(relative) {
                return skip(SkipReason::ExcludedByPattern);
            }
            if !is_rust(rust.as_ref(), path) {
                return skip(SkipReason::NotRust);
            }

            Some(Ok(WalkResult::File(FileEntry {
                path: path.to_path_buf(),
                relative: relative.to_path_buf(),
            })))
        })
    }
}

fn rust_types() -> Option<Types> {
    let mut builder = TypesBuilder::new();
    builder.add_defaults();
    builder.select("rust");
    match builder.build() {
        Ok(types) => Some(types),
        Err(e) => {
            warn!(error = %e, "failed to build rust file matcher, falling back to extension");
            None
        }
    }
}

fn is_rust(types: Option<&Types>, path: &Path) -> bool {
    match types {
        Some(types) => types.matched(path, false).is_whitelist(),
        None => path.extension().is_some_and(|ext| ext == "rs"),
    }
}
