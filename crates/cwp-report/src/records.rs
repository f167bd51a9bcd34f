//! Raw console events and the flat records built from them
//!
//! Raw shapes are decoded leniently: every field defaults when absent or
//! `null`, and scalar fields accept numbers and booleans as text. Only a field
//! of the wrong structural type (object where text is expected) fails decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Report kinds
// =============================================================================

/// The event kinds a report can be generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Waas,
    Runtime,
    ContainerModel,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] =
        [ReportKind::Waas, ReportKind::Runtime, ReportKind::ContainerModel];

    /// Short machine name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Waas => "waas",
            ReportKind::Runtime => "runtime",
            ReportKind::ContainerModel => "container_model",
        }
    }

    /// Prefix used in report file names
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportKind::Waas => "WAAS_Report",
            ReportKind::Runtime => "Runtime_Report",
            ReportKind::ContainerModel => "Container_Model_Report",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportKind::Waas => "WAAS",
            ReportKind::Runtime => "runtime",
            ReportKind::ContainerModel => "container model",
        })
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "waas" => Ok(ReportKind::Waas),
            "runtime" => Ok(ReportKind::Runtime),
            "container_model" | "containers" | "container" => Ok(ReportKind::ContainerModel),
            other => Err(format!("unknown report kind: {}", other)),
        }
    }
}

// =============================================================================
// Raw console shapes
// =============================================================================

/// WAAS firewall audit as returned by the console
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawWaasEvent {
    #[serde(deserialize_with = "text")]
    pub time: String,
    #[serde(deserialize_with = "text")]
    pub url: String,
    #[serde(rename = "type", deserialize_with = "text")]
    pub attack_type: String,
    #[serde(deserialize_with = "text")]
    pub method: String,
    #[serde(deserialize_with = "text")]
    pub url_path: String,
    #[serde(deserialize_with = "text")]
    pub subnet: String,
    #[serde(deserialize_with = "text")]
    pub image_name: String,
    #[serde(deserialize_with = "text_list")]
    pub ns: Vec<String>,
    #[serde(deserialize_with = "text")]
    pub effect: String,
}

/// Runtime audit as returned by the console
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRuntimeEvent {
    #[serde(deserialize_with = "text")]
    pub container_name: String,
    #[serde(deserialize_with = "text")]
    pub cluster: String,
    #[serde(deserialize_with = "text")]
    pub image_name: String,
    #[serde(deserialize_with = "text")]
    pub hostname: String,
    #[serde(deserialize_with = "text")]
    pub time: String,
    #[serde(deserialize_with = "text")]
    pub port: String,
    #[serde(deserialize_with = "text")]
    pub process_path: String,
    #[serde(deserialize_with = "text")]
    pub command: String,
    #[serde(deserialize_with = "text")]
    pub namespace: String,
    #[serde(deserialize_with = "text")]
    pub attack_type: String,
    #[serde(deserialize_with = "text")]
    pub msg: String,
}

/// Container model profile as returned by the console
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawContainerProfile {
    #[serde(deserialize_with = "text")]
    pub image: String,
    #[serde(deserialize_with = "text")]
    pub cluster: String,
    #[serde(deserialize_with = "text")]
    pub namespace: String,
    #[serde(deserialize_with = "text")]
    pub os: String,
    #[serde(deserialize_with = "text")]
    pub entrypoint: String,
    #[serde(deserialize_with = "text")]
    pub state: String,
    #[serde(deserialize_with = "text_list")]
    pub collections: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub network: ProfileNetwork,
    #[serde(deserialize_with = "nullable")]
    pub processes: ProfilePaths,
    #[serde(deserialize_with = "nullable")]
    pub filesystem: ProfilePaths,
}

/// Learned network behaviour of a container model
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileNetwork {
    #[serde(rename = "static")]
    pub static_: Option<StaticNetwork>,
    pub behavioral: Option<BehavioralNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StaticNetwork {
    #[serde(deserialize_with = "nullable")]
    pub listening_ports: Vec<ListeningPorts>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BehavioralNetwork {
    #[serde(deserialize_with = "nullable")]
    pub listening_ports: Vec<ListeningPorts>,
    #[serde(deserialize_with = "nullable")]
    pub outbound_ports: PortsData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListeningPorts {
    pub ports_data: Option<PortsData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortsData {
    #[serde(deserialize_with = "nullable")]
    pub all: bool,
    #[serde(deserialize_with = "nullable")]
    pub ports: Vec<PortEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortEntry {
    pub port: u16,
}

/// Process or filesystem paths, split by how they were learned
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfilePaths {
    #[serde(rename = "static", deserialize_with = "nullable")]
    pub static_: Vec<PathEntry>,
    #[serde(deserialize_with = "nullable")]
    pub behavioral: Vec<PathEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathEntry {
    #[serde(deserialize_with = "text")]
    pub path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::UInt(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = Option::<Vec<Option<Scalar>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .map(|item| item.map(Scalar::into_text).unwrap_or_default())
        .collect())
}

// =============================================================================
// Normalized records
// =============================================================================

/// One WAAS event, flattened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WaasRecord {
    pub host: String,
    pub url: String,
    /// Local time, `DD-MM-YYYY HH:MM:SS`
    pub time: String,
    pub namespace: String,
    pub attack_type: String,
    /// `<method> <path>`
    pub endpoint: String,
    pub source_ip: String,
    pub path: String,
    pub image: String,
    pub effect: String,
}

/// One runtime event, flattened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeRecord {
    pub container_name: String,
    pub cluster: String,
    pub image_name: String,
    pub hostname: String,
    /// Local time, `Weekday, DD Month YYYY HH:MM:SS`
    pub time: String,
    pub port: String,
    pub process_path: String,
    pub command: String,
    pub namespace: String,
    pub attack_type: String,
    pub message: String,
}

/// One container model, flattened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerModelRecord {
    pub image: String,
    pub cluster: String,
    pub namespace: String,
    pub os: String,
    pub entrypoint: String,
    pub state: String,
    /// Collection names joined with `, `
    pub collections: String,
}

/// A normalized record of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    Waas(WaasRecord),
    Runtime(RuntimeRecord),
    ContainerModel(ContainerModelRecord),
}

impl EventRecord {
    pub fn kind(&self) -> ReportKind {
        match self {
            EventRecord::Waas(_) => ReportKind::Waas,
            EventRecord::Runtime(_) => ReportKind::Runtime,
            EventRecord::ContainerModel(_) => ReportKind::ContainerModel,
        }
    }
}

/// WAAS records sharing a URL, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlGroup {
    pub url: String,
    pub records: Vec<WaasRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_kind_from_str() {
        assert_eq!("WAAS".parse::<ReportKind>().unwrap(), ReportKind::Waas);
        assert_eq!("container-model".parse::<ReportKind>().unwrap(), ReportKind::ContainerModel);
        assert!("host".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_report_kind_names_match_serde() {
        for kind in ReportKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
            assert_eq!(kind.as_str().parse::<ReportKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_missing_fields_default() {
        let raw: RawWaasEvent = serde_json::from_value(json!({ "url": "https://a/b" })).unwrap();
        assert_eq!(raw.url, "https://a/b");
        assert_eq!(raw.time, "");
        assert!(raw.ns.is_empty());
    }

    #[test]
    fn test_nulls_and_numbers_become_text() {
        let raw: RawRuntimeEvent = serde_json::from_value(json!({
            "containerName": null,
            "port": 8080,
            "msg": "Reverse shell detected",
        }))
        .unwrap();
        assert_eq!(raw.container_name, "");
        assert_eq!(raw.port, "8080");
        assert_eq!(raw.msg, "Reverse shell detected");
    }

    #[test]
    fn test_wrong_shape_fails() {
        let result = serde_json::from_value::<RawWaasEvent>(json!({ "url": { "href": "x" } }));
        assert!(result.is_err());
    }

    #[test]
    fn test_profile_decode() {
        let raw: RawContainerProfile = serde_json::from_value(json!({
            "image": "registry.io/app:1.2",
            "collections": ["All", "prod"],
            "network": {
                "static": { "listeningPorts": [{ "portsData": { "ports": [{ "port": 80 }] } }] },
                "behavioral": { "outboundPorts": { "ports": [{ "port": 443 }] } }
            },
            "processes": { "behavioral": [{ "path": "/bin/sh" }] }
        }))
        .unwrap();

        assert_eq!(raw.collections, vec!["All", "prod"]);
        let listening = &raw.network.static_.as_ref().unwrap().listening_ports[0];
        assert_eq!(listening.ports_data.as_ref().unwrap().ports[0].port, 80);
        assert_eq!(raw.network.behavioral.as_ref().unwrap().outbound_ports.ports[0].port, 443);
        assert_eq!(raw.processes.behavioral[0].path, "/bin/sh");
        assert!(raw.filesystem.static_.is_empty());
    }

    #[test]
    fn test_profile_null_sections() {
        let raw: RawContainerProfile = serde_json::from_value(json!({
            "image": "nginx",
            "network": { "behavioral": { "listeningPorts": null, "outboundPorts": null } },
            "processes": null,
            "filesystem": { "static": null }
        }))
        .unwrap();
        assert!(raw.processes.behavioral.is_empty());
        assert!(raw.network.behavioral.unwrap().outbound_ports.ports.is_empty());
    }

    #[test]
    fn test_event_record_kind() {
        let record = EventRecord::Runtime(RuntimeRecord::default());
        assert_eq!(record.kind(), ReportKind::Runtime);
    }
}
