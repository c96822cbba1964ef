//! Document discovery under the configured paths.
//!
//! Each configured path is walked recursively with `walkdir`. Files are kept
//! when their path relative to the configured root matches an include glob
//! and no exclude glob. Files from one root are returned sorted by path and
//! roots are visited in configured order. A file reached through two roots
//! (after canonicalisation) is returned once.
//!
//! Problems with a root or an entry never abort discovery; they are
//! reported as [`SkippedFile`]s.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FilesConfig;
use crate::error::{RagError, Result};
use crate::models::SkippedFile;

/// Excluded in addition to `files.exclude_globs`.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/.*"];

/// Compiled include/exclude globs.
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FileFilter {
    pub fn from_config(config: &FilesConfig) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(config.exclude_globs.iter().cloned());

        Ok(Self {
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::config(format!("invalid glob set: {}", e)))
}

/// Result of walking the configured paths.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Canonical file paths, deduplicated.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

pub fn discover(paths: &[String], filter: &FileFilter) -> Discovery {
    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();

    for configured in paths {
        let root = Path::new(configured);
        if !root.exists() {
            tracing::warn!(path = %configured, "document path does not exist");
            discovery.skipped.push(SkippedFile {
                path: configured.clone(),
                reason: "path does not exist".to_string(),
            });
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(filter.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| configured.clone());
                    tracing::warn!(path = %path, error = %e, "cannot read directory entry");
                    discovery.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = match path.strip_prefix(root) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                // A configured path that is itself a file.
                _ => Path::new(path.file_name().unwrap_or(path.as_os_str())),
            };
            if !filter.matches(&relative.to_string_lossy()) {
                continue;
            }
            found.push(path.to_path_buf());
        }
        found.sort();

        for path in found {
            match path.canonicalize() {
                Ok(canonical) => {
                    if seen.insert(canonical.clone()) {
                        discovery.files.push(canonical);
                    }
                }
                Err(e) => discovery.skipped.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    discovery
}

/// Stable identifier of a source: the first 16 bytes of SHA-256 over its
/// canonical path, hex encoded.
pub fn source_id_for(canonical: &Path) -> String {
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    hex::encode(&digest[..16])
}

/// SHA-256 of the file bytes, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> FileFilter {
        FileFilter::from_config(&FilesConfig::default()).unwrap()
    }

    #[test]
    fn test_recursive_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("nested/deeper/c.txt"), "c").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".hidden.md"), "h").unwrap();

        let found = discover(&[root.display().to_string()], &filter());
        let names: Vec<String> = found
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.txt"]);
        assert!(found.skipped.is_empty());
    }

    #[test]
    fn test_missing_path_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope").display().to_string();
        let found = discover(&[missing.clone()], &filter());
        assert!(found.files.is_empty());
        assert_eq!(found.skipped.len(), 1);
        assert_eq!(found.skipped[0].path, missing);
    }

    #[test]
    fn test_overlapping_roots_yield_file_once() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/note.md"), "n").unwrap();

        let found = discover(
            &[
                root.display().to_string(),
                root.join("sub").display().to_string(),
            ],
            &filter(),
        );
        assert_eq!(found.files.len(), 1);
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        fs::write(tmp.path().join("drafts/x.md"), "x").unwrap();
        fs::write(tmp.path().join("y.md"), "y").unwrap();
        let config = FilesConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..FilesConfig::default()
        };
        let filter = FileFilter::from_config(&config).unwrap();
        let found = discover(&[tmp.path().display().to_string()], &filter);
        assert_eq!(found.files.len(), 1);
        assert!(found.files[0].ends_with("y.md"));
    }

    #[test]
    fn test_invalid_glob_is_configuration_error() {
        let config = FilesConfig {
            include_globs: vec!["[".to_string()],
            ..FilesConfig::default()
        };
        assert!(matches!(
            FileFilter::from_config(&config),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_source_id_is_stable() {
        let a = source_id_for(Path::new("/docs/a.md"));
        assert_eq!(a.len(), 32);
        assert_eq!(a, source_id_for(Path::new("/docs/a.md")));
        assert_ne!(a, source_id_for(Path::new("/docs/b.md")));
        assert_eq!(fingerprint(b"abc").len(), 64);
    }
}
