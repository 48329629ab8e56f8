use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Package root holding the template collections (default: next to the executable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,
    #[serde(default = "InstallConfig::default_collections")]
    pub collections: Vec<String>,
    /// File extensions marked executable after copying
    #[serde(default = "InstallConfig::default_executable_extensions")]
    pub executable_extensions: Vec<String>,
}

impl InstallConfig {
    fn default_collections() -> Vec<String> {
        vec![
            "commands".into(),
            "agents".into(),
            "utils".into(),
            "hooks".into(),
            "settings".into(),
        ]
    }
    fn default_executable_extensions() -> Vec<String> {
        vec!["sh".into()]
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            collections: Self::default_collections(),
            executable_extensions: Self::default_executable_extensions(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "SettingsConfig::default_file_name")]
    pub file_name: String,
    /// fsync the settings file and its directory after writing (default: true)
    #[serde(default = "bool_true")]
    pub durable: bool,
}

impl SettingsConfig {
    fn default_file_name() -> String {
        "settings.json".into()
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            file_name: Self::default_file_name(),
            durable: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Directory prefix written into hook commands. Unset: `.claude/hooks` for
    /// local installs, the absolute hooks directory otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_prefix: Option<String>,
    #[serde(default = "HooksConfig::default_execution_gate")]
    pub execution_gate: String,
    #[serde(default = "HooksConfig::default_copy_gate")]
    pub copy_gate: String,
    #[serde(default = "HooksConfig::default_copy_gate_matcher")]
    pub copy_gate_matcher: String,
}

impl HooksConfig {
    fn default_execution_gate() -> String {
        "vbw-execution-gate.sh".into()
    }
    fn default_copy_gate() -> String {
        "vbw-copy-gate.sh".into()
    }
    fn default_copy_gate_matcher() -> String {
        "Bash".into()
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            command_prefix: None,
            execution_gate: Self::default_execution_gate(),
            copy_gate: Self::default_copy_gate(),
            copy_gate_matcher: Self::default_copy_gate_matcher(),
        }
    }
}

fn bool_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn create_default() -> Result<PathBuf> {
        let path = get_config_path()?;
        Config::default().save_to(&path)?;
        Ok(path)
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(config_dir.join("vbw").join("config.toml"))
}

pub fn show_config() -> Result<()> {
    let path = get_config_path()?;
    println!("Config: {}", path.display());
    println!();

    if path.exists() {
        let config = Config::load_from(&path)?;
        println!("{}", toml::to_string_pretty(&config)?);
    } else {
        println!("(default config, file not created)");
        println!();
        println!("{}", toml::to_string_pretty(&Config::default())?);
    }

    Ok(())
}
