//! Console connection and report settings

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::timefmt::utc_offset;

/// Default console API version
pub const DEFAULT_API_VERSION: &str = "v33.01";

/// Default page size for listing endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default number of backoff attempts after a 429
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff step; attempt `n` waits `n` steps
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default runtime report zone
pub const DEFAULT_RUNTIME_TIMEZONE: &str = "Asia/Jakarta";

/// Settings for one console
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Console base URL, e.g. `https://europe-west3.cloud.twistlock.com/eu-123`
    pub console_path: String,
    /// Pre-encoded basic credential
    pub token: String,
    pub api_version: String,
    pub page_size: u32,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    /// Fixed offset applied to WAAS timestamps
    pub waas_utc_offset_hours: i32,
    /// IANA zone applied to runtime timestamps
    pub runtime_timezone: String,
    pub output_dir: PathBuf,
    /// Directory receiving the raw concatenated events, if any
    pub raw_dump: Option<PathBuf>,
    /// Abort a batch on the first bad record instead of skipping it
    pub strict: bool,
    /// Owner stamped on generated runtime rules
    pub rule_owner: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            console_path: String::new(),
            token: String::new(),
            api_version: DEFAULT_API_VERSION.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            request_timeout: DEFAULT_TIMEOUT,
            waas_utc_offset_hours: 7,
            runtime_timezone: DEFAULT_RUNTIME_TIMEZONE.into(),
            output_dir: PathBuf::from("Reports"),
            raw_dump: None,
            strict: false,
            rule_owner: String::new(),
        }
    }
}

impl ConsoleConfig {
    /// Create a config for a console with defaults for everything else
    pub fn new(console_path: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            console_path: console_path.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Reject settings that cannot produce a report
    pub fn validate(&self) -> Result<()> {
        if self.console_path.trim().is_empty() {
            return Err(Error::Config("console path is not set".into()));
        }
        if self.token.trim().is_empty() {
            return Err(Error::Config("token is not set".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page size must be greater than zero".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("max attempts must be greater than zero".into()));
        }
        utc_offset(self.waas_utc_offset_hours)?;
        self.runtime_zone()?;
        Ok(())
    }

    /// Parsed runtime report zone
    pub fn runtime_zone(&self) -> Result<Tz> {
        self.runtime_timezone
            .parse::<Tz>()
            .map_err(|_| Error::Config(format!("unknown time zone: {}", self.runtime_timezone)))
    }

    fn base(&self) -> &str {
        self.console_path.trim_end_matches('/')
    }

    pub fn waas_audits_url(&self) -> String {
        format!("{}/api/{}/audits/firewall/app/container", self.base(), self.api_version)
    }

    /// Runtime audits are only served under `v1`
    pub fn runtime_audits_url(&self) -> String {
        format!("{}/api/v1/audits/runtime/container", self.base())
    }

    pub fn container_profiles_url(&self) -> String {
        format!("{}/api/{}/profiles/container", self.base(), self.api_version)
    }

    pub fn collections_url(&self) -> String {
        format!("{}/api/{}/collections", self.base(), self.api_version)
    }

    pub fn runtime_policy_url(&self) -> String {
        format!("{}/api/v1/policies/runtime/container", self.base())
    }
}
