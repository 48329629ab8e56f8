//! Copies template collections (commands, agents, utils, hooks) into the
//! target config directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStatus {
    Copied {
        files: Vec<PathBuf>,
        executables: usize,
    },
    /// Source directory does not exist
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub name: String,
    pub target: PathBuf,
    pub status: CollectionStatus,
}

impl CollectionReport {
    pub fn copied(&self) -> usize {
        match &self.status {
            CollectionStatus::Copied { files, .. } => files.len(),
            CollectionStatus::Skipped => 0,
        }
    }
}

fn is_executable_type(path: &Path, executable_exts: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| executable_exts.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o755);
    fs::set_permissions(path, perms).with_context(|| {
        format!(
            "Failed to set executable permissions on {}",
            path.display()
        )
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Copy every regular file directly inside `source` into `target`.
///
/// Sub-directories are not descended into. A missing `source` is reported as
/// `Skipped` rather than treated as an error.
pub fn copy_collection(
    name: &str,
    source: &Path,
    target: &Path,
    executable_exts: &[String],
) -> Result<CollectionReport> {
    if !source.is_dir() {
        return Ok(CollectionReport {
            name: name.to_string(),
            target: target.to_path_buf(),
            status: CollectionStatus::Skipped,
        });
    }

    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create directory {}", target.display()))?;

    let mut files = Vec::new();
    let mut executables = 0;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let dest = target.join(entry.file_name());
        fs::copy(entry.path(), &dest).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                entry.path().display(),
                dest.display()
            )
        })?;

        if is_executable_type(&dest, executable_exts) {
            mark_executable(&dest)?;
            executables += 1;
        }
        files.push(dest);
    }

    Ok(CollectionReport {
        name: name.to_string(),
        target: target.to_path_buf(),
        status: CollectionStatus::Copied { files, executables },
    })
}

/// Copy each named collection from `source_root/<name>` to `target_root/<name>`.
pub fn copy_collections(
    source_root: &Path,
    target_root: &Path,
    names: &[String],
    executable_exts: &[String],
) -> Result<Vec<CollectionReport>> {
    names
        .iter()
        .map(|name| {
            copy_collection(
                name,
                &source_root.join(name),
                &target_root.join(name),
                executable_exts,
            )
        })
        .collect()
}
