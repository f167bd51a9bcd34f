//! Report pipeline: fetch, normalize, persist
//!
//! Each run handles one event kind from the first page to the sink. A failed
//! run leaves other kinds untouched; the caller decides what to do next.

use serde::Serialize;

use crate::client::{ConsoleClient, PageSource};
use crate::config::ConsoleConfig;
use crate::error::Result;
use crate::fetch::{write_raw_dump, FetchOutcome, Paginator};
use crate::normalize::{
    group_by_url, normalize_batch, NormalizedBatch, Normalizer, RecordFailure,
};
use crate::records::ReportKind;
use crate::retry::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::sink::{PersistReceipt, Report, Sink};

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub kind: ReportKind,
    /// Raw events fetched
    pub fetched: usize,
    /// Records handed to the sink
    pub normalized: usize,
    /// Records dropped by filtering rules
    pub filtered: usize,
    /// Records skipped after a normalization error
    pub skipped: usize,
    /// URL groups, WAAS only
    pub groups: Option<usize>,
    pub requests: u32,
    pub retries: u32,
    pub receipt: PersistReceipt,
}

/// Result of one kind within [`ReportPipeline::run_all`]
#[derive(Debug)]
pub struct KindOutcome {
    pub kind: ReportKind,
    pub result: Result<ReportSummary>,
}

impl KindOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Normalized report plus the bookkeeping around it
#[derive(Debug)]
pub struct Assembled {
    pub report: Report,
    pub filtered: usize,
    pub skipped: Vec<RecordFailure>,
}

pub struct ReportPipeline<Z = TokioSleeper> {
    client: ConsoleClient,
    config: ConsoleConfig,
    normalizer: Normalizer,
    sleeper: Z,
}

impl ReportPipeline<TokioSleeper> {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: ConsoleClient::new(&config)?,
            normalizer: Normalizer::from_config(&config)?,
            config,
            sleeper: TokioSleeper,
        })
    }
}

impl<Z: Sleeper> ReportPipeline<Z> {
    /// Replace the sleeper used between rate-limit retries
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> ReportPipeline<Z2> {
        ReportPipeline {
            client: self.client,
            config: self.config,
            normalizer: self.normalizer,
            sleeper,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn client(&self) -> &ConsoleClient {
        &self.client
    }

    /// Listing endpoint for a kind
    pub fn endpoint(&self, kind: ReportKind) -> String {
        match kind {
            ReportKind::Waas => self.config.waas_audits_url(),
            ReportKind::Runtime => self.config.runtime_audits_url(),
            ReportKind::ContainerModel => self.config.container_profiles_url(),
        }
    }

    /// Generate and persist the report for `kind`
    pub async fn run(&self, kind: ReportKind, sink: &mut dyn Sink) -> Result<ReportSummary> {
        let listing = self.client.listing(&self.endpoint(kind))?;
        tracing::debug!(%kind, url = %listing.url(), "listing endpoint");
        self.run_with_source(kind, listing, sink).await
    }

    /// Run `kinds` one after another into the same sink
    ///
    /// A failed kind is logged and recorded; the remaining kinds still run.
    pub async fn run_all(&self, kinds: &[ReportKind], sink: &mut dyn Sink) -> Vec<KindOutcome> {
        let mut outcomes = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let result = self.run(kind, &mut *sink).await;
            if let Err(e) = &result {
                tracing::error!(%kind, error = %e, "report failed");
            }
            outcomes.push(KindOutcome { kind, result });
        }
        outcomes
    }

    /// Same as [`run`](Self::run) against an arbitrary page source
    pub async fn run_with_source<S: PageSource>(
        &self,
        kind: ReportKind,
        source: S,
        sink: &mut dyn Sink,
    ) -> Result<ReportSummary> {
        tracing::info!(%kind, "generating report");
        let fetched = self.fetch_from(kind, source).await?;

        let assembled = self.assemble(kind, &fetched.events)?;
        let groups = match &assembled.report {
            Report::Waas(groups) => Some(groups.len()),
            _ => None,
        };

        let receipt = sink.persist(&assembled.report)?;
        if let Some(groups) = groups {
            tracing::info!(unique_urls = groups, "WAAS report grouped");
        }

        Ok(ReportSummary {
            kind,
            fetched: fetched.events.len(),
            normalized: assembled.report.len(),
            filtered: assembled.filtered,
            skipped: assembled.skipped.len(),
            groups,
            requests: fetched.requests,
            retries: fetched.retries,
            receipt,
        })
    }

    /// Fetch every raw event of `kind` from the console
    pub async fn fetch(&self, kind: ReportKind) -> Result<FetchOutcome> {
        let listing = self.client.listing(&self.endpoint(kind))?;
        self.fetch_from(kind, listing).await
    }

    async fn fetch_from<S: PageSource>(&self, kind: ReportKind, source: S) -> Result<FetchOutcome> {
        let policy = BackoffPolicy::new(self.config.max_attempts, self.config.backoff_base);
        let outcome = Paginator::new(source, self.config.page_size, policy)?
            .with_sleeper(&self.sleeper)
            .fetch_all()
            .await?;

        if let Some(dir) = &self.config.raw_dump {
            let name = format!("result_data_{}.json", kind.as_str());
            write_raw_dump(&dir.join(name), &outcome.events)?;
        }

        Ok(outcome)
    }

    /// Normalize raw events of `kind` into a report
    pub fn assemble(&self, kind: ReportKind, events: &[serde_json::Value]) -> Result<Assembled> {
        let strict = self.config.strict;
        let n = &self.normalizer;

        let assembled = match kind {
            ReportKind::Waas => {
                let batch = normalize_batch(events, strict, |i, e| n.waas(i, e).map(Some))?;
                finish(batch, |records| Report::Waas(group_by_url(records)))
            }
            ReportKind::Runtime => {
                let batch = normalize_batch(events, strict, |i, e| n.runtime(i, e))?;
                finish(batch, Report::Runtime)
            }
            ReportKind::ContainerModel => {
                let batch = normalize_batch(events, strict, |i, e| n.container(i, e).map(Some))?;
                finish(batch, Report::ContainerModel)
            }
        };

        if assembled.filtered > 0 {
            tracing::info!(filtered = assembled.filtered, "low-confidence events dropped");
        }
        Ok(assembled)
    }
}

fn finish<T>(batch: NormalizedBatch<T>, build: impl FnOnce(Vec<T>) -> Report) -> Assembled {
    Assembled {
        report: build(batch.records),
        filtered: batch.filtered,
        skipped: batch.skipped,
    }
}
