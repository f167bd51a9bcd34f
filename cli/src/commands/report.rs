//! Report commands

use colored::Colorize;
use cwp_report::{CsvSink, Error, JsonSink, ReportKind, ReportPipeline, ReportSummary, Sink};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::{ReportOptions, ReportTarget, SinkFormat};

impl ReportTarget {
    fn kinds(self) -> Vec<ReportKind> {
        match self {
            ReportTarget::Waas => vec![ReportKind::Waas],
            ReportTarget::Runtime => vec![ReportKind::Runtime],
            ReportTarget::Containers => vec![ReportKind::ContainerModel],
            ReportTarget::All => ReportKind::ALL.to_vec(),
        }
    }
}

/// One line of the run summary
#[derive(Debug, Serialize, Tabled)]
pub struct ReportRow {
    pub kind: String,
    pub status: String,
    pub fetched: usize,
    pub records: usize,
    pub filtered: usize,
    pub skipped: usize,
    #[tabled(display_with = "display_groups")]
    pub groups: Option<usize>,
    pub requests: u32,
    pub retries: u32,
    /// Report file on success, error otherwise
    pub detail: String,
}

fn display_groups(groups: &Option<usize>) -> String {
    groups.map(|g| g.to_string()).unwrap_or_else(|| "-".into())
}

impl From<ReportSummary> for ReportRow {
    fn from(summary: ReportSummary) -> Self {
        Self {
            kind: summary.kind.to_string(),
            status: "ok".into(),
            fetched: summary.fetched,
            records: summary.normalized,
            filtered: summary.filtered,
            skipped: summary.skipped,
            groups: summary.groups,
            requests: summary.requests,
            retries: summary.retries,
            detail: summary
                .receipt
                .path
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

impl ReportRow {
    fn failed(kind: ReportKind, error: &Error) -> Self {
        let status = if error.is_rate_limited() { "rate limited" } else { "failed" };
        Self {
            kind: kind.to_string(),
            status: status.into(),
            fetched: 0,
            records: 0,
            filtered: 0,
            skipped: 0,
            groups: None,
            requests: 0,
            retries: 0,
            detail: error.to_string(),
        }
    }
}

pub async fn handle(
    target: ReportTarget,
    options: ReportOptions,
    ctx: &Context,
) -> anyhow::Result<()> {
    let mut config = ctx.console_config()?;
    if let Some(dir) = options.output_dir {
        config.output_dir = dir;
    }
    config.raw_dump = options.raw_dump;
    config.strict = options.strict;

    let mut sink: Box<dyn Sink> = match options.sink {
        SinkFormat::Csv => Box::new(CsvSink::new(&config.output_dir)),
        SinkFormat::Json => Box::new(JsonSink::new(&config.output_dir)),
    };
    let pipeline = ReportPipeline::new(config)?;

    let outcomes = pipeline.run_all(&target.kinds(), sink.as_mut()).await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();

    let rows: Vec<ReportRow> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(summary) => {
                eprintln!("{} {} report generated", "✓".green(), outcome.kind);
                ReportRow::from(summary)
            }
            Err(e) => {
                eprintln!("{} {} report failed: {}", "✗".red(), outcome.kind, e);
                ReportRow::failed(outcome.kind, &e)
            }
        })
        .collect();

    ctx.format.print_rows(&rows)?;

    if failed > 0 {
        anyhow::bail!("{} of {} reports failed", failed, rows.len());
    }
    Ok(())
}
