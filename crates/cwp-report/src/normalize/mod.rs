//! Record normalization
//!
//! One normalizer per event kind, chosen by the caller. Each turns one raw
//! console event into one flat record (or nothing, when filtered).

pub mod container;
pub mod runtime;
pub mod waas;

use chrono_tz::Tz;
use serde::de::DeserializeOwned;

use crate::config::ConsoleConfig;
use crate::error::{Error, Result};
use crate::records::{ContainerModelRecord, EventRecord, ReportKind, RuntimeRecord, WaasRecord};
use crate::timefmt::utc_offset;

pub use container::normalize_container;
pub use runtime::{is_low_confidence, normalize_runtime};
pub use waas::{derive_host, group_by_url, normalize_waas};

/// A record that could not be normalized
#[derive(Debug)]
pub struct RecordFailure {
    /// Position in the fetched batch
    pub index: usize,
    pub error: Error,
}

/// Output of normalizing one fetched batch
#[derive(Debug)]
pub struct NormalizedBatch<T> {
    pub records: Vec<T>,
    /// Records dropped by a filtering rule
    pub filtered: usize,
    /// Records that failed and were skipped
    pub skipped: Vec<RecordFailure>,
}

impl<T> Default for NormalizedBatch<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            filtered: 0,
            skipped: Vec::new(),
        }
    }
}

/// Time settings shared by the normalizers
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    waas_offset_hours: i32,
    runtime_zone: Tz,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            waas_offset_hours: 7,
            runtime_zone: chrono_tz::Asia::Jakarta,
        }
    }
}

impl Normalizer {
    /// Rejects a WAAS offset that cannot be rendered
    pub fn new(waas_offset_hours: i32, runtime_zone: Tz) -> Result<Self> {
        utc_offset(waas_offset_hours)?;
        Ok(Self {
            waas_offset_hours,
            runtime_zone,
        })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        Self::new(config.waas_utc_offset_hours, config.runtime_zone()?)
    }

    /// Normalize a single raw event as `kind`
    pub fn normalize(
        &self,
        kind: ReportKind,
        index: usize,
        raw: &serde_json::Value,
    ) -> Result<Option<EventRecord>> {
        match kind {
            ReportKind::Waas => self.waas(index, raw).map(|r| Some(EventRecord::Waas(r))),
            ReportKind::Runtime => self.runtime(index, raw).map(|r| r.map(EventRecord::Runtime)),
            ReportKind::ContainerModel => {
                self.container(index, raw).map(|r| Some(EventRecord::ContainerModel(r)))
            }
        }
    }

    pub fn waas(&self, index: usize, raw: &serde_json::Value) -> Result<WaasRecord> {
        normalize_waas(&decode(index, raw)?, self.waas_offset_hours)
    }

    pub fn runtime(&self, index: usize, raw: &serde_json::Value) -> Result<Option<RuntimeRecord>> {
        normalize_runtime(&decode(index, raw)?, self.runtime_zone)
    }

    pub fn container(&self, index: usize, raw: &serde_json::Value) -> Result<ContainerModelRecord> {
        Ok(normalize_container(&decode(index, raw)?))
    }
}

/// Decode the fields a normalizer reads
pub fn decode<T: DeserializeOwned>(index: usize, raw: &serde_json::Value) -> Result<T> {
    serde::Deserialize::deserialize(raw).map_err(|source| Error::Decode { index, source })
}

/// Normalize a batch with `f`, skipping bad records unless `strict`
///
/// Errors that are not about a single record always abort the batch.
pub fn normalize_batch<T, F>(
    raw: &[serde_json::Value],
    strict: bool,
    f: F,
) -> Result<NormalizedBatch<T>>
where
    F: Fn(usize, &serde_json::Value) -> Result<Option<T>>,
{
    let mut batch = NormalizedBatch::default();

    for (index, event) in raw.iter().enumerate() {
        match f(index, event) {
            Ok(Some(record)) => batch.records.push(record),
            Ok(None) => batch.filtered += 1,
            Err(error) if strict || !error.is_record_error() => return Err(error),
            Err(error) => {
                tracing::warn!(index, %error, "skipping record");
                batch.skipped.push(RecordFailure { index, error });
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events() -> Vec<serde_json::Value> {
        vec![
            json!({ "url": "https://a.example/x", "time": "2024-03-05T10:15:30Z", "ns": ["prod"] }),
            json!({ "url": "https://b.example/y", "time": "not a time" }),
            json!({ "url": "https://c.example/z", "time": "2024-03-05T11:00:00.1Z" }),
        ]
    }

    #[test]
    fn test_skips_bad_records() {
        let normalizer = Normalizer::default();
        let raw = events();
        let batch = normalize_batch(&raw, false, |i, e| normalizer.waas(i, e).map(Some)).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].index, 1);
        assert!(matches!(batch.skipped[0].error, Error::TimestampParse { .. }));
    }

    #[test]
    fn test_strict_aborts_batch() {
        let normalizer = Normalizer::default();
        let raw = events();
        let result = normalize_batch(&raw, true, |i, e| normalizer.waas(i, e).map(Some));
        assert!(matches!(result, Err(Error::TimestampParse { .. })));
    }

    #[test]
    fn test_session_errors_abort_lenient_batch() {
        let raw = events();
        let result: Result<NormalizedBatch<()>> = normalize_batch(&raw, false, |i, _| {
            if i == 1 {
                Err(Error::Config("broken".into()))
            } else {
                Ok(Some(()))
            }
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unrenderable_offset() {
        assert!(Normalizer::new(-12, chrono_tz::UTC).is_ok());
        assert!(matches!(Normalizer::new(24, chrono_tz::UTC), Err(Error::Config(_))));
    }

    #[test]
    fn test_decode_error_carries_index() {
        let normalizer = Normalizer::default();
        let err = normalizer.waas(4, &json!({ "time": ["2024"] })).unwrap_err();
        assert!(matches!(err, Error::Decode { index: 4, .. }));
    }

    #[test]
    fn test_tagged_dispatch() {
        let normalizer = Normalizer::default();
        let runtime = json!({ "time": "2024-03-05T10:15:30Z", "msg": "Reverse shell detected" });
        let record = normalizer.normalize(ReportKind::Runtime, 0, &runtime).unwrap().unwrap();
        assert_eq!(record.kind(), ReportKind::Runtime);

        let quiet = json!({
            "time": "2024-03-05T10:15:30Z",
            "msg": "Low likelihood that this event is suspicious",
        });
        assert!(normalizer.normalize(ReportKind::Runtime, 1, &quiet).unwrap().is_none());
    }
}
