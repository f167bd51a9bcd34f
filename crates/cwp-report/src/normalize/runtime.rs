//! Runtime event normalization

use chrono_tz::Tz;

use crate::error::Result;
use crate::records::{RawRuntimeEvent, RuntimeRecord};
use crate::timefmt::runtime_local_time;

/// Console wording for events it considers unlikely to be malicious
const LOW_CONFIDENCE_MARKER: &str = "low likelihood that this event is suspicious";

/// Whether a runtime message is a low-confidence event
pub fn is_low_confidence(message: &str) -> bool {
    message.to_lowercase().contains(LOW_CONFIDENCE_MARKER)
}

/// Flatten one runtime audit; low-confidence events yield `None`
pub fn normalize_runtime(raw: &RawRuntimeEvent, zone: Tz) -> Result<Option<RuntimeRecord>> {
    if is_low_confidence(&raw.msg) {
        return Ok(None);
    }

    Ok(Some(RuntimeRecord {
        container_name: raw.container_name.clone(),
        cluster: raw.cluster.clone(),
        image_name: raw.image_name.clone(),
        hostname: raw.hostname.clone(),
        time: runtime_local_time(&raw.time, zone)?,
        port: raw.port.clone(),
        process_path: raw.process_path.clone(),
        command: raw.command.clone(),
        namespace: raw.namespace.clone(),
        attack_type: raw.attack_type.clone(),
        message: raw.msg.clone(),
    }))
}
