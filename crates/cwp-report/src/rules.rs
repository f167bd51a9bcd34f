//! Runtime rule generation
//!
//! Turns learned container models into runtime protection rules that allow
//! exactly what the model observed, each scoped to a collection for its image,
//! and pushes them to the console.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::client::ConsoleClient;
use crate::config::ConsoleConfig;
use crate::error::{Error, Result};
use crate::normalize::decode;
use crate::records::{
    ListeningPorts, PathEntry, PortsData, ProfileNetwork, ProfilePaths, RawContainerProfile,
};

/// Console limit on collection names and descriptions
const MAX_NAME_LEN: usize = 100;

const COLLECTION_COLOR: &str = "#3A21B2";

// =============================================================================
// Ports
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    All,
    Port(u16),
}

/// Ports a container model was seen using
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerPorts {
    pub listening: Vec<PortSpec>,
    pub outbound: Vec<PortSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn add_ports(list: &mut Vec<PortSpec>, data: &PortsData) {
    if data.all {
        push_unique(list, PortSpec::All);
    } else {
        for entry in &data.ports {
            push_unique(list, PortSpec::Port(entry.port));
        }
    }
}

fn add_listening(list: &mut Vec<PortSpec>, entries: &[ListeningPorts]) {
    for data in entries.iter().filter_map(|e| e.ports_data.as_ref()) {
        add_ports(list, data);
    }
}

/// Listening ports from static and behavioral data, outbound from behavioral
pub fn collect_ports(network: &ProfileNetwork) -> ContainerPorts {
    let mut ports = ContainerPorts::default();

    if let Some(static_) = &network.static_ {
        add_listening(&mut ports.listening, &static_.listening_ports);
    }
    if let Some(behavioral) = &network.behavioral {
        add_ports(&mut ports.outbound, &behavioral.outbound_ports);
        add_listening(&mut ports.listening, &behavioral.listening_ports);
    }

    ports
}

/// `All` covers the whole port space; otherwise one single-port range each
pub fn expand_ports(ports: &[PortSpec]) -> Vec<PortRange> {
    if ports.contains(&PortSpec::All) {
        return vec![PortRange { start: 1, end: 65535 }];
    }
    ports
        .iter()
        .filter_map(|p| match p {
            PortSpec::Port(port) => Some(PortRange { start: *port, end: *port }),
            PortSpec::All => None,
        })
        .collect()
}

/// Behavioral paths first, then static, without duplicates
pub fn allowed_paths(paths: &ProfilePaths) -> Vec<String> {
    let mut allowed = Vec::new();
    for PathEntry { path } in paths.behavioral.iter().chain(&paths.static_) {
        push_unique(&mut allowed, path.clone());
    }
    allowed
}

// =============================================================================
// Naming
// =============================================================================

pub fn rule_name(image: &str) -> String {
    format!("Runtime Rule for {}", image.replace('.', "-"))
}

/// `Image <image>` with `/` and `.` made console-safe, shortened to the
/// first segment when over the length limit
pub fn collection_name(image: &str) -> String {
    let name = format!("Image {}", image.replace('/', " - ").replace('.', "_"));
    if name.chars().count() > MAX_NAME_LEN {
        return name.split(" - ").next().unwrap_or_default().to_string();
    }
    name
}

pub fn collection_description(image: &str) -> String {
    format!("Automatically created collection used for image {}", image)
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

// =============================================================================
// Policy shape
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Alert,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(rename = "accountIDs")]
    pub account_ids: Vec<String>,
    #[serde(rename = "appIDs")]
    pub app_ids: Vec<String>,
    pub clusters: Vec<String>,
    pub color: String,
    pub containers: Vec<String>,
    pub description: String,
    pub functions: Vec<String>,
    pub hosts: Vec<String>,
    pub images: Vec<String>,
    pub labels: Vec<String>,
    pub name: String,
    pub namespaces: Vec<String>,
    pub prisma: bool,
    pub system: bool,
}

impl Collection {
    /// Collection matching a single image everywhere
    pub fn for_image(image: &str) -> Self {
        let any = || vec!["*".to_string()];
        Self {
            account_ids: any(),
            app_ids: any(),
            clusters: any(),
            color: COLLECTION_COLOR.into(),
            containers: any(),
            description: collection_description(image),
            functions: any(),
            hosts: any(),
            images: vec![image.to_string()],
            labels: any(),
            name: collection_name(image),
            namespaces: any(),
            prisma: false,
            system: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeniedList {
    pub effect: Effect,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortList {
    pub allowed: Vec<PortRange>,
    pub denied: Vec<PortRange>,
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainList {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsPolicy {
    pub default_effect: Effect,
    pub disabled: bool,
    pub domain_list: DomainList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemPolicy {
    pub allowed_list: Vec<String>,
    pub backdoor_files_effect: Effect,
    pub default_effect: Effect,
    pub denied_list: DeniedList,
    pub disabled: bool,
    pub encrypted_binaries_effect: Effect,
    pub new_files_effect: Effect,
    #[serde(rename = "suspiciousELFHeadersEffect")]
    pub suspicious_elf_headers_effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    pub default_effect: Effect,
    #[serde(rename = "deniedIPs")]
    pub denied_ips: Vec<String>,
    #[serde(rename = "deniedIPsEffect")]
    pub denied_ips_effect: Effect,
    pub disabled: bool,
    pub listening_ports: PortList,
    pub modified_proc_effect: Effect,
    pub outbound_ports: PortList,
    pub port_scan_effect: Effect,
    pub raw_sockets_effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessesPolicy {
    pub allowed_list: Vec<String>,
    pub crypto_miners_effect: Effect,
    pub default_effect: Effect,
    pub denied_list: DeniedList,
    pub disabled: bool,
    pub lateral_movement_effect: Effect,
    pub modified_process_effect: Effect,
    pub reverse_shell_effect: Effect,
    pub suid_binaries_effect: Effect,
}

/// A container runtime rule as the console expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRule {
    pub advanced_protection_effect: Effect,
    pub cloud_metadata_enforcement_effect: Effect,
    pub collections: Vec<Collection>,
    pub custom_rules: Vec<serde_json::Value>,
    pub dns: DnsPolicy,
    pub filesystem: FilesystemPolicy,
    pub kubernetes_enforcement_effect: Effect,
    /// RFC 3339 with a `+00:00` offset
    pub modified: String,
    pub name: String,
    pub network: NetworkPolicy,
    pub owner: String,
    pub previous_name: String,
    pub processes: ProcessesPolicy,
    pub skip_exec_sessions: bool,
    pub wild_fire_analysis: Effect,
}

/// Body of the runtime policy PUT
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimePolicy {
    pub rules: Vec<RuntimeRule>,
}

/// Allow-list rule for one container model; everything else alerts
pub fn build_rule(
    profile: &RawContainerProfile,
    owner: &str,
    modified: DateTime<Utc>,
) -> RuntimeRule {
    let ports = collect_ports(&profile.network);

    RuntimeRule {
        advanced_protection_effect: Effect::Alert,
        cloud_metadata_enforcement_effect: Effect::Disable,
        collections: vec![Collection::for_image(&profile.image)],
        custom_rules: Vec::new(),
        dns: DnsPolicy {
            default_effect: Effect::Alert,
            disabled: true,
            domain_list: DomainList {
                allowed: Vec::new(),
                denied: Vec::new(),
                effect: Effect::Alert,
            },
        },
        filesystem: FilesystemPolicy {
            allowed_list: allowed_paths(&profile.filesystem),
            backdoor_files_effect: Effect::Alert,
            default_effect: Effect::Alert,
            denied_list: DeniedList { effect: Effect::Alert, paths: Vec::new() },
            disabled: false,
            encrypted_binaries_effect: Effect::Alert,
            new_files_effect: Effect::Alert,
            suspicious_elf_headers_effect: Effect::Alert,
        },
        kubernetes_enforcement_effect: Effect::Disable,
        modified: modified.to_rfc3339_opts(SecondsFormat::Secs, false),
        name: rule_name(&profile.image),
        network: NetworkPolicy {
            allowed_ips: Vec::new(),
            default_effect: Effect::Alert,
            denied_ips: Vec::new(),
            denied_ips_effect: Effect::Alert,
            disabled: false,
            listening_ports: PortList {
                allowed: expand_ports(&ports.listening),
                denied: Vec::new(),
                effect: Effect::Alert,
            },
            modified_proc_effect: Effect::Alert,
            outbound_ports: PortList {
                allowed: expand_ports(&ports.outbound),
                denied: Vec::new(),
                effect: Effect::Alert,
            },
            port_scan_effect: Effect::Alert,
            raw_sockets_effect: Effect::Alert,
        },
        owner: owner.to_string(),
        previous_name: String::new(),
        processes: ProcessesPolicy {
            allowed_list: allowed_paths(&profile.processes),
            crypto_miners_effect: Effect::Alert,
            default_effect: Effect::Alert,
            denied_list: DeniedList { effect: Effect::Disable, paths: Vec::new() },
            disabled: false,
            lateral_movement_effect: Effect::Alert,
            modified_process_effect: Effect::Alert,
            reverse_shell_effect: Effect::Alert,
            suid_binaries_effect: Effect::Disable,
        },
        skip_exec_sessions: false,
        wild_fire_analysis: Effect::Alert,
    }
}

/// Decode raw container model profiles, failing on the first malformed one
pub fn decode_profiles(raw: &[serde_json::Value]) -> Result<Vec<RawContainerProfile>> {
    raw.iter().enumerate().map(|(i, value)| decode(i, value)).collect()
}

/// Read container model profiles from a JSON array on disk
pub fn load_profiles(path: &Path) -> Result<Vec<RawContainerProfile>> {
    let content = std::fs::read_to_string(path)?;
    let raw: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    decode_profiles(&raw)
}

/// One rule per profile, all stamped with the same time
pub fn build_policy(
    profiles: &[RawContainerProfile],
    owner: &str,
    modified: DateTime<Utc>,
) -> RuntimePolicy {
    RuntimePolicy {
        rules: profiles.iter().map(|p| build_rule(p, owner, modified)).collect(),
    }
}

// =============================================================================
// Push
// =============================================================================

/// What happened to each collection during a push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub collections_created: usize,
    pub collections_existing: usize,
    pub collections_failed: usize,
    pub rules: usize,
}

/// Create each rule's collection, then replace the runtime policy
///
/// Collection failures are logged and do not stop the push; a rejected
/// policy PUT is returned as [`Error::PolicyRejected`].
pub async fn push_policy(
    client: &ConsoleClient,
    config: &ConsoleConfig,
    policy: &RuntimePolicy,
) -> Result<PushSummary> {
    let mut summary = PushSummary {
        rules: policy.rules.len(),
        ..Default::default()
    };

    let collections_url = config.collections_url();
    for collection in policy.rules.iter().flat_map(|r| r.collections.first()) {
        let (status, body) = client.post_json(&collections_url, collection).await?;
        match status {
            200 => {
                tracing::info!(collection = %collection.name, "collection added");
                summary.collections_created += 1;
            }
            409 => {
                tracing::warn!(collection = %collection.name, "collection already exists");
                summary.collections_existing += 1;
            }
            _ => {
                tracing::warn!(
                    collection = %collection.name,
                    status,
                    %body,
                    "error adding collection"
                );
                summary.collections_failed += 1;
            }
        }
    }

    let (status, body) = client.put_json(&config.runtime_policy_url(), policy).await?;
    if status != 200 {
        tracing::error!(status, %body, "error adding rules");
        return Err(Error::PolicyRejected { status });
    }

    tracing::info!(rules = summary.rules, "rules added");
    Ok(summary)
}
