//! CLI Commands

pub mod config;
pub mod report;
pub mod rules;

use anyhow::Context as _;
use cwp_report::ConsoleConfig;

use crate::config::Config;
use crate::output::OutputFormat;

/// Connection values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub console_path: Option<String>,
    pub token: Option<String>,
    pub api_version: Option<String>,
}

/// Everything a console command needs
pub struct Context {
    pub overrides: Overrides,
    pub settings: Config,
    pub format: OutputFormat,
}

impl Context {
    pub fn load(
        overrides: Overrides,
        profile: Option<&str>,
        format: OutputFormat,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            overrides,
            settings: Config::load(profile)?,
            format,
        })
    }

    /// Flags and environment win over the profile file, which wins over defaults
    pub fn console_config(&self) -> anyhow::Result<ConsoleConfig> {
        let console_path = self
            .overrides
            .console_path
            .clone()
            .or_else(|| self.settings.console_path.clone())
            .context("Missing console path: use --console-path, CONSOLE_PATH or `config set`")?;
        let token = self
            .overrides
            .token
            .clone()
            .or_else(|| self.settings.token.clone())
            .context("Missing token: use --token, TOKEN or `config set token`")?;

        let mut config = ConsoleConfig::new(console_path, token);
        let api_version = self
            .overrides
            .api_version
            .clone()
            .or_else(|| self.settings.api_version.clone());
        if let Some(version) = api_version {
            config.api_version = version;
        }
        if let Some(dir) = &self.settings.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(size) = self.settings.page_size {
            config.page_size = size;
        }
        if let Some(zone) = &self.settings.runtime_timezone {
            config.runtime_timezone = zone.clone();
        }
        if let Some(hours) = self.settings.waas_utc_offset_hours {
            config.waas_utc_offset_hours = hours;
        }
        if let Some(owner) = &self.settings.rule_owner {
            config.rule_owner = owner.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
