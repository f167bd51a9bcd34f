//! CLI Configuration

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Keys accepted by `config set`/`config get`
pub const KEYS: [&str; 8] = [
    "console_path",
    "token",
    "api_version",
    "output_dir",
    "page_size",
    "runtime_timezone",
    "waas_utc_offset_hours",
    "rule_owner",
];

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub console_path: Option<String>,
    pub token: Option<String>,
    pub api_version: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub page_size: Option<u32>,
    pub runtime_timezone: Option<String>,
    pub waas_utc_offset_hours: Option<i32>,
    pub rule_owner: Option<String>,
}

impl Config {
    pub fn load(profile: Option<&str>) -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path(profile)?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, profile: Option<&str>) -> anyhow::Result<PathBuf> {
        let path = Self::config_path(profile)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn config_path(profile: Option<&str>) -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Cannot find home directory")?;
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(home.join(".cwpreport").join(filename))
    }

    pub fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        match key {
            "console_path" => self.console_path = Some(value),
            "token" => self.token = Some(value),
            "api_version" => self.api_version = Some(value),
            "output_dir" => self.output_dir = Some(PathBuf::from(value)),
            "page_size" => {
                let size = value
                    .parse()
                    .with_context(|| format!("invalid page size: {}", value))?;
                self.page_size = Some(size)
            }
            "runtime_timezone" => self.runtime_timezone = Some(value),
            "waas_utc_offset_hours" => {
                self.waas_utc_offset_hours =
                    Some(value.parse().with_context(|| format!("invalid UTC offset: {}", value))?)
            }
            "rule_owner" => self.rule_owner = Some(value),
            _ => bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Display value for `key`; the token is masked
    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = match key {
            "console_path" => self.console_path.clone(),
            "token" => self.token.as_deref().map(mask),
            "api_version" => self.api_version.clone(),
            "output_dir" => self.output_dir.as_ref().map(|p| p.display().to_string()),
            "page_size" => self.page_size.map(|n| n.to_string()),
            "runtime_timezone" => self.runtime_timezone.clone(),
            "waas_utc_offset_hours" => self.waas_utc_offset_hours.map(|n| n.to_string()),
            "rule_owner" => self.rule_owner.clone(),
            _ => bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }
}

/// First 8 characters followed by `****`
pub fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(8).collect();
    format!("{}****", visible)
}
