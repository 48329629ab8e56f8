use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// fsync the temp file and its parent directory around the rename
    Synced,
    /// rename only
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { bytes: u64 },
    Unchanged,
}

/// Whole-file replacement through a sibling temp file and rename, so a reader
/// never sees a half-written settings file.
/// Identical content is left alone and reported as `Unchanged`.
pub struct AtomicWriter {
    durability: Durability,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new(Durability::Synced)
    }
}

impl AtomicWriter {
    pub fn new(durability: Durability) -> Self {
        Self { durability }
    }

    /// A symlinked `path` is followed: the file it points at is replaced and
    /// the link itself stays in place.
    pub fn replace(&self, path: &Path, content: &[u8]) -> Result<WriteOutcome> {
        let resolved = resolve_link(path)?;
        let path = resolved.as_path();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            // "settings.json" has an empty parent; the temp file goes in cwd
            _ => Path::new("."),
        };

        let existing = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        if existing.as_deref() == Some(content) {
            return Ok(WriteOutcome::Unchanged);
        }

        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            writer
                .write_all(content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        if existing.is_some() {
            if let Ok(meta) = fs::metadata(path) {
                fs::set_permissions(temp.path(), meta.permissions()).with_context(|| {
                    format!("Failed to preserve permissions of {}", path.display())
                })?;
            }
        }

        if self.durability == Durability::Synced {
            temp.as_file()
                .sync_data()
                .with_context(|| format!("Failed to sync {}", path.display()))?;
        }

        temp.persist(path).map_err(|e| {
            anyhow::Error::new(e.error).context(format!("Failed to replace {}", path.display()))
        })?;

        if self.durability == Durability::Synced {
            sync_dir(parent)?;
        }

        Ok(WriteOutcome::Written {
            bytes: content.len() as u64,
        })
    }
}

/// Final target of `path` when it is a symlink, `path` itself otherwise.
fn resolve_link(path: &Path) -> Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => match fs::canonicalize(path) {
            Ok(target) => Ok(target),
            // dangling link: create the file it names
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let link = fs::read_link(path)
                    .with_context(|| format!("Failed to read link {}", path.display()))?;
                Ok(match path.parent() {
                    Some(dir) if link.is_relative() => dir.join(link),
                    _ => link,
                })
            }
            Err(err) => {
                Err(err).with_context(|| format!("Failed to resolve link {}", path.display()))
            }
        },
        _ => Ok(path.to_path_buf()),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("Failed to sync directory {}", dir.display()))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_then_skips_identical_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        let writer = AtomicWriter::default();

        let first = writer.replace(&path, b"{}\n").unwrap();
        assert_eq!(first, WriteOutcome::Written { bytes: 3 });

        let second = writer.replace(&path, b"{}\n").unwrap();
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), b"{}\n");
    }

    #[test]
    fn different_content_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, "{}").unwrap();

        let outcome = AtomicWriter::new(Durability::Fast)
            .replace(&path, b"{\"k\": 1}")
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written { bytes: 8 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"k\": 1}");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".claude").join("settings.json");

        AtomicWriter::new(Durability::Fast)
            .replace(&path, b"{\"a\": 1}\n")
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\": 1}\n");
    }

    #[cfg(unix)]
    #[test]
    fn keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("perm.json");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        AtomicWriter::default().replace(&path, b"new").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_is_written_through_link() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("dotfiles-settings.json");
        let link = tmp.path().join("settings.json");
        fs::write(&real, "{}").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        AtomicWriter::default().replace(&link, b"{\"a\": 1}").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "{\"a\": 1}");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_relative_link_creates_its_target() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("settings.json");
        std::os::unix::fs::symlink("store/real.json", &link).unwrap();

        AtomicWriter::new(Durability::Fast)
            .replace(&link, b"x")
            .unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(tmp.path().join("store").join("real.json")).unwrap(), b"x");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.json");
        AtomicWriter::default().replace(&path, b"x").unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("clean.json")]);
    }
}
