//! Report sinks
//!
//! A [`Sink`] durably persists one finished [`Report`]. The CSV sink keeps the
//! column names the dashboards read; the JSON sink keeps the grouped shape.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::records::{ContainerModelRecord, ReportKind, RuntimeRecord, UrlGroup};

pub const WAAS_COLUMNS: [&str; 10] = [
    "URL",
    "Host",
    "Time",
    "Namespace",
    "AttackType",
    "API Endpoint",
    "IPAddress",
    "Path",
    "Image",
    "Effect",
];

pub const RUNTIME_COLUMNS: [&str; 11] = [
    "containerName",
    "Cluster",
    "Image",
    "Hostname",
    "Time",
    "Port",
    "ProcessPath",
    "Command",
    "Namespace",
    "AttackType",
    "Message",
];

pub const CONTAINER_MODEL_COLUMNS: [&str; 7] =
    ["Image", "Cluster", "Namespace", "OS", "Entrypoint", "State", "Collections"];

/// A finished report for one event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Waas(Vec<UrlGroup>),
    Runtime(Vec<RuntimeRecord>),
    ContainerModel(Vec<ContainerModelRecord>),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Waas(_) => ReportKind::Waas,
            Report::Runtime(_) => ReportKind::Runtime,
            Report::ContainerModel(_) => ReportKind::ContainerModel,
        }
    }

    /// Number of records, across all groups
    pub fn len(&self) -> usize {
        match self {
            Report::Waas(groups) => groups.iter().map(|g| g.records.len()).sum(),
            Report::Runtime(records) => records.len(),
            Report::ContainerModel(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Report::Waas(_) => &WAAS_COLUMNS,
            Report::Runtime(_) => &RUNTIME_COLUMNS,
            Report::ContainerModel(_) => &CONTAINER_MODEL_COLUMNS,
        }
    }

    /// Tabular rows in column order; WAAS rows run group by group
    pub fn rows(&self) -> Vec<Vec<String>> {
        match self {
            Report::Waas(groups) => groups
                .iter()
                .flat_map(|group| {
                    group.records.iter().map(move |r| {
                        vec![
                            group.url.clone(),
                            r.host.clone(),
                            r.time.clone(),
                            r.namespace.clone(),
                            r.attack_type.clone(),
                            r.endpoint.clone(),
                            r.source_ip.clone(),
                            r.path.clone(),
                            r.image.clone(),
                            r.effect.clone(),
                        ]
                    })
                })
                .collect(),
            Report::Runtime(records) => records
                .iter()
                .map(|r| {
                    vec![
                        r.container_name.clone(),
                        r.cluster.clone(),
                        r.image_name.clone(),
                        r.hostname.clone(),
                        r.time.clone(),
                        r.port.clone(),
                        r.process_path.clone(),
                        r.command.clone(),
                        r.namespace.clone(),
                        r.attack_type.clone(),
                        r.message.clone(),
                    ]
                })
                .collect(),
            Report::ContainerModel(records) => records
                .iter()
                .map(|r| {
                    vec![
                        r.image.clone(),
                        r.cluster.clone(),
                        r.namespace.clone(),
                        r.os.clone(),
                        r.entrypoint.clone(),
                        r.state.clone(),
                        r.collections.clone(),
                    ]
                })
                .collect(),
        }
    }
}

/// What a sink wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistReceipt {
    pub path: Option<PathBuf>,
    pub rows: usize,
}

/// Durable destination for finished reports
pub trait Sink {
    fn persist(&mut self, report: &Report) -> Result<PersistReceipt>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn persist(&mut self, report: &Report) -> Result<PersistReceipt> {
        (**self).persist(report)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y_%m_%d_%H-%M-%S").to_string()
}

fn report_path(dir: &Path, kind: ReportKind, stamp: &str, extension: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.join(format!("{}_{}.{}", kind.file_prefix(), stamp, extension)))
}

// =============================================================================
// CSV
// =============================================================================

/// Writes `<dir>/<Kind>_Report_<stamp>.csv`
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    stamp: Option<String>,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), stamp: None }
    }

    /// Use a fixed file stamp instead of the current local time
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = Some(stamp.into());
        self
    }
}

impl Sink for CsvSink {
    fn persist(&mut self, report: &Report) -> Result<PersistReceipt> {
        let stamp = self.stamp.clone().unwrap_or_else(timestamp);
        let path = report_path(&self.dir, report.kind(), &stamp, "csv")?;

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(report.columns())?;
        let rows = report.rows();
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = rows.len(), "report saved");
        Ok(PersistReceipt { path: Some(path), rows: rows.len() })
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Writes `<dir>/<Kind>_Report_<stamp>.json`, keeping WAAS groups intact
#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
    stamp: Option<String>,
}

impl JsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), stamp: None }
    }

    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = Some(stamp.into());
        self
    }
}

impl Sink for JsonSink {
    fn persist(&mut self, report: &Report) -> Result<PersistReceipt> {
        let stamp = self.stamp.clone().unwrap_or_else(timestamp);
        let path = report_path(&self.dir, report.kind(), &stamp, "json")?;

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;

        tracing::info!(path = %path.display(), records = report.len(), "report saved");
        Ok(PersistReceipt { path: Some(path), rows: report.len() })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps persisted reports in memory
    #[derive(Debug, Default)]
    pub struct MemorySink {
        pub reports: Vec<Report>,
    }

    impl Sink for MemorySink {
        fn persist(&mut self, report: &Report) -> Result<PersistReceipt> {
            self.reports.push(report.clone());
            Ok(PersistReceipt { path: None, rows: report.len() })
        }
    }
}
