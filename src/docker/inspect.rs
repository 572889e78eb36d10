//! Schema for the subset of `docker inspect --type container` output we use.

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::Error as _;

use crate::error::{Error, Result};

use super::types::ContainerStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    id: String,
    state: StateRecord,
    network_settings: NetworkRecord,
    config: ConfigRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateRecord {
    status: String,
    running: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkRecord {
    /// `null` until the container has been started at least once.
    ports: Option<HashMap<String, Option<Vec<PortBinding>>>>,
    #[serde(default)]
    gateway: String,
    #[serde(default)]
    networks: Option<HashMap<String, EndpointRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointRecord {
    #[serde(default)]
    gateway: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PortBinding {
    host_port: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigRecord {
    labels: Option<HashMap<String, String>>,
}

/// Decode an inspection payload that must describe exactly one container.
pub fn parse_status(id: &str, payload: &[u8]) -> Result<ContainerStatus> {
    let mut records: Vec<InspectRecord> = serde_json::from_slice(payload)?;
    if records.len() != 1 {
        return Err(Error::AmbiguousContainer {
            id: id.to_string(),
            count: records.len(),
        });
    }
    let record = records.remove(0);

    let mut port_mappings: HashMap<u16, Vec<u16>> = HashMap::new();
    for (key, bindings) in record.network_settings.ports.unwrap_or_default() {
        let internal = parse_port_key(&key)?;
        let hosts = port_mappings.entry(internal).or_default();
        for binding in bindings.unwrap_or_default() {
            let host = binding.host_port.parse::<u16>().map_err(|_| {
                serde_json::Error::custom(format!(
                    "invalid HostPort {:?} for {key}",
                    binding.host_port
                ))
            })?;
            // IPv4 and IPv6 bindings of one port share the host port.
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
    }

    let gateway = if record.network_settings.gateway.is_empty() {
        // Containers on user-defined networks only report per-network gateways.
        let mut networks: Vec<_> = record
            .network_settings
            .networks
            .unwrap_or_default()
            .into_iter()
            .collect();
        networks.sort_by(|a, b| a.0.cmp(&b.0));
        networks
            .into_iter()
            .map(|(_, endpoint)| endpoint.gateway)
            .find(|gw| !gw.is_empty())
            .unwrap_or_default()
    } else {
        record.network_settings.gateway
    };

    Ok(ContainerStatus {
        id: record.id,
        status: record.state.status,
        running: record.state.running,
        port_mappings,
        gateway,
        labels: record.config.labels.unwrap_or_default(),
    })
}

/// `"8080/tcp"` -> 8080.
fn parse_port_key(key: &str) -> Result<u16> {
    let port = key.split('/').next().unwrap_or_default();
    port.parse().map_err(|_| {
        Error::Payload(serde_json::Error::custom(format!(
            "invalid port key {key:?}"
        )))
    })
}
