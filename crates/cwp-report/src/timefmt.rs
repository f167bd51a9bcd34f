//! Event timestamp conversion
//!
//! The console reports UTC as `YYYY-MM-DDTHH:MM:SSZ`, sometimes with a
//! fractional second. WAAS reports render a fixed offset, runtime reports a
//! verbose timestamp in a named zone; the two layouts stay distinct.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

const WHOLE_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";
const FRACTIONAL_SECONDS: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// `05-03-2024 17:15:30`
pub const WAAS_LAYOUT: &str = "%d-%m-%Y %H:%M:%S";

/// `Tuesday, 05 March 2024 17:15:30`
pub const RUNTIME_LAYOUT: &str = "%A, %d %B %Y %H:%M:%S";

/// Parse a console timestamp, whole seconds first
pub fn parse_event_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, WHOLE_SECONDS)
        .or_else(|_| NaiveDateTime::parse_from_str(value, FRACTIONAL_SECONDS))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| Error::TimestampParse { value: value.to_string() })
}

/// Offset `hours` east of UTC; anything a day or more away is a config error
pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::Config(format!("UTC offset out of range: {}", hours)))
}

/// Render at a fixed UTC offset, no DST
pub fn format_fixed_offset(utc: DateTime<Utc>, offset_hours: i32) -> Result<String> {
    let offset = utc_offset(offset_hours)?;
    Ok(utc.with_timezone(&offset).format(WAAS_LAYOUT).to_string())
}

/// Render in a named zone
pub fn format_named_zone(utc: DateTime<Utc>, zone: Tz) -> String {
    utc.with_timezone(&zone).format(RUNTIME_LAYOUT).to_string()
}

/// Parse and render for a WAAS report
pub fn waas_local_time(value: &str, offset_hours: i32) -> Result<String> {
    format_fixed_offset(parse_event_time(value)?, offset_hours)
}

/// Parse and render for a runtime report
pub fn runtime_local_time(value: &str, zone: Tz) -> Result<String> {
    parse_event_time(value).map(|utc| format_named_zone(utc, zone))
}
