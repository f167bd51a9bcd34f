//! Config commands

use colored::Colorize;

use crate::config::{Config, KEYS};
use crate::output::OutputFormat;
use crate::ConfigCommands;

pub fn handle(
    action: ConfigCommands,
    profile: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Init => {
            let path = Config::config_path(profile)?;
            if path.exists() {
                println!("Configuration already exists at {}", path.display());
                return Ok(());
            }
            Config::default().save(profile)?;
            println!("{} Configuration initialized at {}", "✓".green(), path.display());
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load(profile)?;
            config.set(&key, value)?;
            config.save(profile)?;
            println!("{} Set {} successfully", "✓".green(), key);
        }
        ConfigCommands::Get { key } => {
            let config = Config::load(profile)?;
            let value = config.get(&key)?;
            println!("{}: {}", key, value.unwrap_or_else(|| "(not set)".into()));
        }
        ConfigCommands::List => {
            let config = Config::load(profile)?;
            match format {
                OutputFormat::Table => {
                    for key in KEYS {
                        let value = config
                            .get(key)?
                            .unwrap_or_else(|| "(not set)".dimmed().to_string());
                        println!("{}: {}", key.bold(), value);
                    }
                }
                _ => {
                    let masked = Config {
                        token: config.token.as_deref().map(crate::config::mask),
                        ..config
                    };
                    format.print(&masked)?;
                }
            }
        }
    }
    Ok(())
}
