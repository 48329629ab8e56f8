//! Registers the VBW gate hooks in a Claude `settings.json`.

use crate::atomic_write::{AtomicWriter, Durability, WriteOutcome};
use crate::config::HooksConfig;
use crate::settings_merge;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why an existing settings file could not be merged into.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{} is not valid JSON: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} holds a JSON {found}, expected an object", .path.display())]
    NotAnObject { path: PathBuf, found: &'static str },
}

/// The hook registrations merged into settings: the execution gate on `Stop`
/// and the copy gate on `PreToolUse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFragment {
    pub execution_gate: String,
    pub copy_gate: String,
    pub copy_gate_matcher: String,
}

impl HookFragment {
    /// Build the fragment with every command rooted at `prefix`.
    pub fn new(prefix: &str, hooks: &HooksConfig) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let command = |script: &str| {
            if prefix.is_empty() {
                script.to_string()
            } else {
                format!("{}/{}", prefix, script)
            }
        };
        Self {
            execution_gate: command(&hooks.execution_gate),
            copy_gate: command(&hooks.copy_gate),
            copy_gate_matcher: hooks.copy_gate_matcher.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "hooks": {
                "Stop": [
                    {"hooks": [{"type": "command", "command": self.execution_gate}]}
                ],
                "PreToolUse": [
                    {
                        "matcher": self.copy_gate_matcher,
                        "hooks": [{"type": "command", "command": self.copy_gate}]
                    }
                ]
            }
        })
    }
}

#[derive(Debug)]
pub struct Backup {
    pub path: PathBuf,
    pub reason: SettingsError,
}

#[derive(Debug)]
pub struct HooksReport {
    pub settings_path: PathBuf,
    pub backup: Option<Backup>,
    pub groups_added: usize,
    pub outcome: WriteOutcome,
}

enum Existing {
    Absent,
    Document(Value),
    Unusable { raw: Vec<u8>, error: SettingsError },
}

fn read_existing(path: &Path) -> Result<Existing> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Existing::Absent),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let error = match serde_json::from_slice::<Value>(&raw) {
        Ok(doc @ Value::Object(_)) => return Ok(Existing::Document(doc)),
        Ok(other) => SettingsError::NotAnObject {
            path: path.to_path_buf(),
            found: json_kind(&other),
        },
        Err(source) => SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        },
    };
    Ok(Existing::Unusable { raw, error })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Sibling backup path: `<path>.backup.<unix-epoch-millis>`.
pub fn backup_path_for(path: &Path, epoch_millis: i64) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".backup.{}", epoch_millis));
    PathBuf::from(name)
}

fn write_backup(path: &Path, raw: &[u8]) -> Result<PathBuf> {
    let mut millis = chrono::Utc::now().timestamp_millis();
    let mut backup = backup_path_for(path, millis);
    // two runs inside the same millisecond must not clobber the first backup
    while backup.exists() {
        millis += 1;
        backup = backup_path_for(path, millis);
    }
    fs::write(&backup, raw)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    Ok(backup)
}

/// Serialize with 2-space indentation and a trailing newline.
pub fn render_settings(doc: &Value) -> Result<String> {
    let mut out = serde_json::to_string_pretty(doc).context("Failed to serialize settings")?;
    out.push('\n');
    Ok(out)
}

/// Merge `fragment` into the settings document at `path`.
///
/// A file that is not a JSON object is copied aside byte-for-byte before the
/// merge starts over from `{}`. Read, backup and write failures are fatal.
pub fn install_hooks_config(
    path: &Path,
    fragment: &HookFragment,
    durability: Durability,
) -> Result<HooksReport> {
    let (existing, backup) = match read_existing(path)? {
        Existing::Absent => (Value::Object(Map::new()), None),
        Existing::Document(doc) => (doc, None),
        Existing::Unusable { raw, error } => {
            let backup_path = write_backup(path, &raw)?;
            let backup = Backup {
                path: backup_path,
                reason: error,
            };
            (Value::Object(Map::new()), Some(backup))
        }
    };

    let merged = settings_merge::merge(&existing, &fragment.to_value());
    let groups_added = settings_merge::added_hook_groups(&existing, &merged);
    let rendered = render_settings(&merged)?;

    let outcome = AtomicWriter::new(durability)
        .replace(path, rendered.as_bytes())
        .with_context(|| format!("Failed to write settings file {}", path.display()))?;

    Ok(HooksReport {
        settings_path: path.to_path_buf(),
        backup,
        groups_added,
        outcome,
    })
}
