//! CWP Report
//!
//! Retrieves audit events from a cloud workload protection console, flattens
//! them into fixed-shape records and hands them to a report sink.
//!
//! # Architecture
//! ```text
//! ┌───────────────┐    ┌────────────────┐    ┌──────────────┐    ┌──────────┐
//! │ ConsoleClient │───▶│   Paginator    │───▶│  Normalizer  │───▶│   Sink   │
//! │ (PageSource)  │    │ (BackoffPolicy)│    │ (per kind)   │    │ csv/json │
//! └───────────────┘    └────────────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Learned container models can also be turned into runtime rules, see
//! [`rules`].
//!
//! One [`ReportPipeline`] run fetches a single event kind to completion
//! before anything is normalized. The whole result set is held in memory.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod retry;
pub mod rules;
pub mod sink;
pub mod timefmt;

pub use client::{ConsoleClient, Listing, PageResponse, PageSource};
pub use config::ConsoleConfig;
pub use error::{Error, Result};
pub use fetch::{FetchOutcome, Paginator};
pub use normalize::{NormalizedBatch, RecordFailure};
pub use pipeline::{KindOutcome, ReportPipeline, ReportSummary};
pub use records::{
    ContainerModelRecord, EventRecord, ReportKind, RuntimeRecord, UrlGroup, WaasRecord,
};
pub use retry::{BackoffPolicy, RetryOutcome, RetryState, Sleeper, TokioSleeper};
pub use rules::{build_policy, push_policy, PushSummary, RuntimePolicy, RuntimeRule};
pub use sink::{CsvSink, JsonSink, PersistReceipt, Report, Sink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
