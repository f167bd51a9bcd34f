//! Runtime rule commands

use anyhow::Context as _;
use chrono::Utc;
use colored::Colorize;
use cwp_report::rules::{build_policy, decode_profiles, load_profiles, push_policy};
use cwp_report::{PushSummary, ReportKind, ReportPipeline, RuntimePolicy};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::{RuleCommands, RuleSource};

#[derive(Debug, Serialize, Tabled)]
pub struct PushRow {
    pub rules: usize,
    pub collections_created: usize,
    pub collections_existing: usize,
    pub collections_failed: usize,
}

impl From<PushSummary> for PushRow {
    fn from(summary: PushSummary) -> Self {
        Self {
            rules: summary.rules,
            collections_created: summary.collections_created,
            collections_existing: summary.collections_existing,
            collections_failed: summary.collections_failed,
        }
    }
}

pub async fn handle(action: RuleCommands, ctx: &Context) -> anyhow::Result<()> {
    match action {
        RuleCommands::Generate { source, out } => {
            let policy = load_policy(&source, ctx).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&policy)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!(
                        "{} Wrote {} rules to {}",
                        "✓".green(),
                        policy.rules.len(),
                        path.display()
                    );
                }
                None => ctx.format.print(&policy)?,
            }
        }
        RuleCommands::Push { source, dry_run } => {
            let policy = load_policy(&source, ctx).await?;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&policy)?);
                return Ok(());
            }

            let pipeline = ReportPipeline::new(ctx.console_config()?)?;
            let summary = push_policy(pipeline.client(), pipeline.config(), &policy).await?;
            eprintln!("{} Pushed {} rules", "✓".green(), summary.rules);
            ctx.format.print_rows(&[PushRow::from(summary)])?;
        }
    }
    Ok(())
}

/// Container models from a file, or fetched from the console
async fn load_policy(source: &RuleSource, ctx: &Context) -> anyhow::Result<RuntimePolicy> {
    let profiles = match &source.from_file {
        Some(path) => load_profiles(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            let pipeline = ReportPipeline::new(ctx.console_config()?)?;
            let outcome = pipeline.fetch(ReportKind::ContainerModel).await?;
            decode_profiles(&outcome.events)?
        }
    };

    let owner = source
        .owner
        .clone()
        .or_else(|| ctx.settings.rule_owner.clone())
        .unwrap_or_default();
    tracing::info!(profiles = profiles.len(), "building runtime rules");
    Ok(build_policy(&profiles, &owner, Utc::now()))
}
