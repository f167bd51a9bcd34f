//! Paginated fetch
//!
//! Walks a listing endpoint with `limit`/`offset` until the console returns an
//! empty page. Pages are requested strictly one after another; page N+1 is
//! never requested before page N succeeded. There is no page ceiling, so an
//! endpoint that never returns an empty page keeps the session running.

use std::path::Path;

use crate::client::{PageResponse, PageSource};
use crate::error::{Error, Result};
use crate::retry::{BackoffPolicy, RetryOutcome, RetryState, Sleeper, TokioSleeper};

/// Everything one fetch session produced
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Raw events in page-arrival order
    pub events: Vec<serde_json::Value>,
    /// HTTP requests issued, retries included
    pub requests: u32,
    /// Backoff retries issued
    pub retries: u32,
}

/// Pages through a [`PageSource`]
pub struct Paginator<S, Z = TokioSleeper> {
    source: S,
    policy: BackoffPolicy,
    page_size: u32,
    sleeper: Z,
}

impl<S: PageSource> Paginator<S, TokioSleeper> {
    /// A zero page size would never leave offset 0 and is rejected
    pub fn new(source: S, page_size: u32, policy: BackoffPolicy) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::Config("page size must be greater than zero".into()));
        }
        Ok(Self {
            source,
            policy,
            page_size,
            sleeper: TokioSleeper,
        })
    }
}

impl<S: PageSource, Z: Sleeper> Paginator<S, Z> {
    /// Replace the sleeper used between retries
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Paginator<S, Z2> {
        Paginator {
            source: self.source,
            policy: self.policy,
            page_size: self.page_size,
            sleeper,
        }
    }

    /// Fetch every page until an empty one comes back
    pub async fn fetch_all(&self) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut offset: u64 = 0;

        loop {
            let page = self.fetch_page(offset, &mut outcome).await?;
            if page.is_empty() {
                tracing::info!(total = outcome.events.len(), "all events have been fetched");
                return Ok(outcome);
            }

            outcome.events.extend(page);
            tracing::info!(offset, total = outcome.events.len(), "retrieved page");
            offset += u64::from(self.page_size);
        }
    }

    /// One page at `offset`, riding out rate limiting
    async fn fetch_page(
        &self,
        offset: u64,
        outcome: &mut FetchOutcome,
    ) -> Result<Vec<serde_json::Value>> {
        let mut response = self.request(offset, outcome).await?;
        let mut state = RetryState::Requesting;

        loop {
            state = self.policy.transition(state, response.status);
            match state {
                RetryState::Done(RetryOutcome::Success) => return Ok(response.events),
                RetryState::Done(RetryOutcome::Abandoned { status, attempts: 0 }) => {
                    tracing::error!(status, offset, "listing request failed");
                    return Err(Error::RequestFailed { status, offset });
                }
                RetryState::Done(RetryOutcome::Abandoned { status, attempts }) => {
                    tracing::error!(status, offset, attempts, "max retry attempts reached");
                    return Err(Error::RateLimited { offset, attempts, status });
                }
                RetryState::Backoff(attempt) => {
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(
                        offset,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "rate limited, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    outcome.retries += 1;
                    response = self.request(offset, outcome).await?;
                }
                RetryState::Requesting => unreachable!("backoff never returns to requesting"),
            }
        }
    }

    async fn request(&self, offset: u64, outcome: &mut FetchOutcome) -> Result<PageResponse> {
        outcome.requests += 1;
        let response = self.source.fetch_page(offset, self.page_size).await?;
        tracing::debug!(status = response.status, offset, "page response");
        Ok(response)
    }
}

/// Write the raw concatenated events as pretty JSON
pub fn write_raw_dump(path: &Path, events: &[serde_json::Value]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(events)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), events = events.len(), "raw events written");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::FakeListing;
    use super::*;
    use crate::retry::testing::RecordingSleeper;
    use std::time::Duration;

    fn paginator(
        source: &FakeListing,
        page_size: u32,
    ) -> Paginator<&FakeListing, RecordingSleeper> {
        Paginator::new(source, page_size, BackoffPolicy::new(5, Duration::from_secs(2)))
            .unwrap()
            .with_sleeper(RecordingSleeper::default())
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let source = FakeListing::with_total(3);
        let result = Paginator::new(&source, 0, BackoffPolicy::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_fetches_every_record() {
        let cases = [
            (0usize, 100u32),
            (1, 100),
            (99, 100),
            (100, 100),
            (250, 100),
            (300, 100),
            (7, 3),
        ];
        for (total, page_size) in cases {
            let source = FakeListing::with_total(total);
            let outcome = paginator(&source, page_size).fetch_all().await.unwrap();

            assert_eq!(outcome.events.len(), total);
            // The final request is always the empty page
            let expected = total.div_ceil(page_size as usize) + 1;
            assert_eq!(
                outcome.requests as usize, expected,
                "total={total} page_size={page_size}"
            );
            assert_eq!(outcome.retries, 0);
        }
    }

    #[tokio::test]
    async fn test_request_count_for_exact_pages() {
        // ceil((N + 1) / P) requests when N is a multiple of P
        let source = FakeListing::with_total(400);
        let outcome = paginator(&source, 100).fetch_all().await.unwrap();
        assert_eq!(outcome.requests, 5);
        assert_eq!(source.offsets(), vec![0, 100, 200, 300, 400]);
    }

    #[tokio::test]
    async fn test_preserves_page_order() {
        let source = FakeListing::with_total(5);
        let outcome = paginator(&source, 2).fetch_all().await.unwrap();
        let ids: Vec<u64> = outcome.events.iter().map(|e| e["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_recovers_from_rate_limit() {
        let source = FakeListing::with_total(250).script(100, &[429, 429, 429]);
        let pager = paginator(&source, 100);
        let outcome = pager.fetch_all().await.unwrap();

        assert_eq!(outcome.events.len(), 250);
        assert_eq!(outcome.retries, 3);
        // Offset 100 was requested once plus three retries, then never again
        assert_eq!(source.offsets(), vec![0, 100, 100, 100, 100, 200, 300]);
        assert_eq!(
            pager.sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(6)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let source = FakeListing::with_total(500).script(200, &[429, 429, 429, 429, 429, 429]);
        let pager = paginator(&source, 100);
        let err = pager.fetch_all().await.unwrap_err();

        match err {
            Error::RateLimited { offset, attempts, status } => {
                assert_eq!(offset, 200);
                assert_eq!(attempts, 5);
                assert_eq!(status, 429);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing past the failing offset
        assert_eq!(source.offsets().iter().max(), Some(&200));
        assert_eq!(pager.sleeper.waits().len(), 5);
    }

    #[tokio::test]
    async fn test_hard_failure_is_not_retried() {
        let source = FakeListing::with_total(150).script(100, &[500]);
        let pager = paginator(&source, 100);
        let err = pager.fetch_all().await.unwrap_err();

        assert!(matches!(err, Error::RequestFailed { status: 500, offset: 100 }));
        assert_eq!(source.offsets(), vec![0, 100]);
        assert!(pager.sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_first_page_is_not_empty_success() {
        let source = FakeListing::with_total(0).script(0, &[401]);
        let result = paginator(&source, 100).fetch_all().await;
        assert_eq!(result.unwrap_err().status(), Some(401));
    }

    #[test]
    fn test_write_raw_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("result_data.json");
        let events = vec![serde_json::json!({ "url": "https://a/x" })];

        write_raw_dump(&path, &events).unwrap();

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, events);
    }
}
