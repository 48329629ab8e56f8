use crate::atomic_write::{Durability, WriteOutcome};
use crate::config::Config;
use crate::hooks_config::{self, HookFragment, HooksReport};
use crate::materialize::{self, CollectionReport, CollectionStatus};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub global: bool,
    pub source: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub skip_hooks: bool,
}

#[derive(Debug)]
pub struct InstallSummary {
    pub target: PathBuf,
    pub collections: Vec<CollectionReport>,
    pub hooks: Option<HooksReport>,
}

/// Resolve the `.claude` directory to install into.
pub fn resolve_target(opts: &InstallOptions) -> Result<PathBuf> {
    if let Some(target) = &opts.target {
        return Ok(target.clone());
    }
    if opts.global {
        let home = dirs::home_dir().context("Cannot find home directory")?;
        Ok(home.join(".claude"))
    } else {
        let cwd = std::env::current_dir().context("Cannot read current directory")?;
        Ok(cwd.join(".claude"))
    }
}

/// Resolve the package root holding the template collections.
pub fn resolve_source(opts: &InstallOptions, config: &Config) -> Result<PathBuf> {
    if let Some(source) = opts.source.as_ref().or(config.install.source_dir.as_ref()) {
        return Ok(source.clone());
    }
    // the binary ships in <package>/bin, templates sit beside it
    let exe = std::env::current_exe().context("Cannot locate the vbw executable")?;
    exe.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .context("Cannot derive package root from executable path")
}

/// Prefix written in front of the gate script names in hook commands.
pub fn hook_command_prefix(opts: &InstallOptions, config: &Config, target: &Path) -> String {
    if let Some(prefix) = &config.hooks.command_prefix {
        return prefix.clone();
    }
    if opts.global || opts.target.is_some() {
        target.join("hooks").to_string_lossy().into_owned()
    } else {
        ".claude/hooks".to_string()
    }
}

pub fn install(opts: &InstallOptions, config: &Config, verbose: u8) -> Result<InstallSummary> {
    let target = resolve_target(opts)?;
    let source = resolve_source(opts, config)?;

    if verbose > 0 {
        eprintln!("Source: {}", source.display());
        eprintln!("Collections: {}", config.install.collections.join(", "));
    }

    let collections = materialize::copy_collections(
        &source,
        &target,
        &config.install.collections,
        &config.install.executable_extensions,
    )?;

    let hooks = if opts.skip_hooks {
        None
    } else {
        let prefix = hook_command_prefix(opts, config, &target);
        let fragment = HookFragment::new(&prefix, &config.hooks);
        let durability = if config.settings.durable {
            Durability::Synced
        } else {
            Durability::Fast
        };
        if verbose > 1 {
            eprintln!(
                "Hook fragment: {}",
                serde_json::to_string(&fragment.to_value())?
            );
        }
        let settings_path = target.join(&config.settings.file_name);
        Some(hooks_config::install_hooks_config(
            &settings_path,
            &fragment,
            durability,
        )?)
    };

    Ok(InstallSummary {
        target,
        collections,
        hooks,
    })
}

/// Slash commands provided by the installed command templates.
pub fn available_commands(collections: &[CollectionReport]) -> Vec<String> {
    collections
        .iter()
        .filter(|c| c.name == "commands")
        .flat_map(|c| match &c.status {
            CollectionStatus::Copied { files, .. } => files.clone(),
            CollectionStatus::Skipped => Vec::new(),
        })
        .filter(|f| f.extension().and_then(|e| e.to_str()) == Some("md"))
        .filter_map(|f| f.file_stem().map(|s| format!("/{}", s.to_string_lossy())))
        .collect()
}

pub fn run(opts: &InstallOptions, config: &Config, verbose: u8) -> Result<()> {
    println!("VBW Framework Installer");
    println!("=======================");

    let summary = install(opts, config, verbose)?;
    println!("Target: {}", summary.target.display());
    println!();

    for report in &summary.collections {
        match &report.status {
            CollectionStatus::Copied { files, executables } => {
                println!(
                    "  Copied {} {} files to {}",
                    files.len(),
                    report.name,
                    report.target.display()
                );
                if verbose > 0 && *executables > 0 {
                    eprintln!("    {} marked executable", executables);
                }
            }
            CollectionStatus::Skipped => {
                println!(
                    "  {} {} (source not found)",
                    "Skipping".yellow(),
                    report.name
                );
            }
        }
    }

    if let Some(hooks) = &summary.hooks {
        if let Some(backup) = &hooks.backup {
            println!(
                "  {} {}",
                "Warning:".yellow().bold(),
                backup.reason
            );
            println!("  Backed up original to {}", backup.path.display());
        }
        match hooks.outcome {
            WriteOutcome::Unchanged => println!(
                "  Hooks already configured in {}",
                hooks.settings_path.display()
            ),
            WriteOutcome::Written { bytes } => {
                println!(
                    "  Registered {} hook groups in {}",
                    hooks.groups_added,
                    hooks.settings_path.display()
                );
                if verbose > 0 {
                    eprintln!("    wrote {} bytes", bytes);
                }
            }
        }
    }

    println!();
    println!("{}", "Done.".green());
    let commands = available_commands(&summary.collections);
    if !commands.is_empty() {
        println!("Available commands:");
        for cmd in commands {
            println!("  {}", cmd);
        }
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn package(tmp: &Path) -> PathBuf {
        let pkg = tmp.join("pkg");
        for (dir, file, body) in [
            ("commands", "vbw-implement.md", "implement"),
            ("commands", "vbw-team.md", "team"),
            ("agents", "validator.md", "agent"),
            ("hooks", "vbw-execution-gate.sh", "#!/bin/sh\n"),
            ("hooks", "vbw-copy-gate.sh", "#!/bin/sh\n"),
        ] {
            fs::create_dir_all(pkg.join(dir)).unwrap();
            fs::write(pkg.join(dir).join(file), body).unwrap();
        }
        pkg
    }

    #[test]
    fn explicit_target_wins() {
        let opts = InstallOptions {
            global: true,
            target: Some(PathBuf::from("/tmp/x/.claude")),
            ..Default::default()
        };
        assert_eq!(
            resolve_target(&opts).unwrap(),
            PathBuf::from("/tmp/x/.claude")
        );
    }

    #[test]
    fn cli_source_beats_config_source() {
        let mut config = Config::default();
        config.install.source_dir = Some(PathBuf::from("/from/config"));
        let opts = InstallOptions {
            source: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        assert_eq!(
            resolve_source(&opts, &config).unwrap(),
            PathBuf::from("/from/cli")
        );
        assert_eq!(
            resolve_source(&InstallOptions::default(), &config).unwrap(),
            PathBuf::from("/from/config")
        );
    }

    #[test]
    fn local_installs_use_relative_hook_commands() {
        let config = Config::default();
        let target = Path::new("/work/.claude");
        assert_eq!(
            hook_command_prefix(&InstallOptions::default(), &config, target),
            ".claude/hooks"
        );
        let global = InstallOptions {
            global: true,
            ..Default::default()
        };
        assert_eq!(
            hook_command_prefix(&global, &config, target),
            "/work/.claude/hooks"
        );

        let mut config = Config::default();
        config.hooks.command_prefix = Some("$HOME/bin".into());
        assert_eq!(hook_command_prefix(&global, &config, target), "$HOME/bin");
    }

    #[test]
    fn full_install_copies_and_registers_hooks() {
        let tmp = TempDir::new().unwrap();
        let pkg = package(tmp.path());
        let target = tmp.path().join("home").join(".claude");
        let opts = InstallOptions {
            source: Some(pkg),
            target: Some(target.clone()),
            ..Default::default()
        };

        let summary = install(&opts, &Config::default(), 0).unwrap();
        let counts: Vec<usize> = summary.collections.iter().map(|c| c.copied()).collect();
        assert_eq!(counts, vec![2, 1, 0, 2, 0]);
        assert_eq!(
            available_commands(&summary.collections),
            vec!["/vbw-implement", "/vbw-team"]
        );

        let hooks = summary.hooks.unwrap();
        assert_eq!(hooks.groups_added, 2);
        let settings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(target.join("settings.json")).unwrap())
                .unwrap();
        let expected = target
            .join("hooks")
            .join("vbw-copy-gate.sh")
            .to_string_lossy()
            .into_owned();
        assert_eq!(
            settings["hooks"]["PreToolUse"][0]["hooks"][0]["command"],
            serde_json::Value::String(expected)
        );
    }

    #[test]
    fn skip_hooks_leaves_settings_alone() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join(".claude");
        let opts = InstallOptions {
            source: Some(package(tmp.path())),
            target: Some(target.clone()),
            skip_hooks: true,
            ..Default::default()
        };

        let summary = install(&opts, &Config::default(), 0).unwrap();
        assert!(summary.hooks.is_none());
        assert!(!target.join("settings.json").exists());
    }
}
