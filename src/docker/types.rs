use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Port Gerrit serves HTTP on inside the container.
pub const INTERNAL_HTTP_PORT: u16 = 8080;

/// Port Gerrit serves SSH on inside the container.
pub const INTERNAL_SSH_PORT: u16 = 29418;

/// Label applied to every container this tool launches.
pub const LABEL_KEY: &str = "gerrittest";
pub const LABEL_VALUE: &str = "1";

/// Image used when neither the CLI, the environment nor the config file
/// names one.
pub const DEFAULT_IMAGE: &str = "opalmer/gerrittest:latest";

/// One of the two services Gerrit exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Service {
    Http,
    Ssh,
}

impl Service {
    pub fn internal_port(self) -> u16 {
        match self {
            Service::Http => INTERNAL_HTTP_PORT,
            Service::Ssh => INTERNAL_SSH_PORT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Http => "http",
            Service::Ssh => "ssh",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which host port a service should be published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortRequest {
    Fixed(u16),
    #[default]
    Random,
}

impl PortRequest {
    /// Returns the host port, rejecting `Fixed(0)`.
    pub fn host_port(self) -> Result<Option<u16>> {
        match self {
            PortRequest::Fixed(0) => Err(Error::InvalidPortKind("0".into())),
            PortRequest::Fixed(p) => Ok(Some(p)),
            PortRequest::Random => Ok(None),
        }
    }
}

impl fmt::Display for PortRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRequest::Fixed(p) => write!(f, "{p}"),
            PortRequest::Random => f.write_str("random"),
        }
    }
}

/// Accepts `random`, `0` (also random) or a port number.
impl FromStr for PortRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(PortRequest::Random);
        }
        match s.parse::<u16>() {
            Ok(0) => Ok(PortRequest::Random),
            Ok(p) => Ok(PortRequest::Fixed(p)),
            Err(_) => Err(Error::InvalidPortKind(s.to_string())),
        }
    }
}

impl Serialize for PortRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PortRequest::Random => serializer.serialize_str("random"),
            PortRequest::Fixed(p) => serializer.serialize_u16(*p),
        }
    }
}

impl<'de> Deserialize<'de> for PortRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortVisitor;

        impl<'de> Visitor<'de> for PortVisitor {
            type Value = PortRequest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"random\" or a port in 1-65535")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<PortRequest, E> {
                match u16::try_from(value) {
                    Ok(0) => Ok(PortRequest::Random),
                    Ok(p) => Ok(PortRequest::Fixed(p)),
                    Err(_) => Err(E::custom(format!("port {value} is out of range"))),
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<PortRequest, E> {
                if value < 0 {
                    return Err(E::custom("port must not be negative"));
                }
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PortRequest, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PortVisitor)
    }
}

/// Everything needed to launch a Gerrit container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub bind_address: Option<String>,
    pub http: PortRequest,
    pub ssh: PortRequest,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            bind_address: None,
            http: PortRequest::Random,
            ssh: PortRequest::Random,
        }
    }
}

/// Argument list for the runtime's `run` subcommand. The image is always the
/// final token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Values of every `--publish` flag, in order.
    pub fn publish_clauses(&self) -> Vec<&str> {
        flag_values(&self.args, "--publish")
    }

    pub fn label_clauses(&self) -> Vec<&str> {
        flag_values(&self.args, "--label")
    }

    pub fn image(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect()
}

/// Snapshot of one container, rebuilt on every inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub id: String,
    pub status: String,
    pub running: bool,
    /// Internal port to every host port it is published on.
    pub port_mappings: HashMap<u16, Vec<u16>>,
    pub gateway: String,
    pub labels: HashMap<String, String>,
}

impl ContainerStatus {
    pub fn is_labeled(&self) -> bool {
        self.labels.get(LABEL_KEY).map(String::as_str) == Some(LABEL_VALUE)
    }

    /// Unique host port for `internal`, or `None` if it is not published.
    pub fn host_port(&self, internal: u16) -> Result<Option<u16>> {
        match self.port_mappings.get(&internal).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([port]) => Ok(Some(*port)),
            Some(ports) => Err(Error::AmbiguousPortMapping {
                port: internal,
                count: ports.len(),
            }),
        }
    }

    pub fn record(&self) -> ContainerRecord {
        ContainerRecord {
            id: self.id.clone(),
            labeled: self.is_labeled(),
        }
    }
}

/// What the registry sees when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub labeled: bool,
}

/// Containers selected for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillTarget {
    All,
    /// Full ids or id prefixes.
    Ids(BTreeSet<String>),
}

impl KillTarget {
    pub fn from_args(all: bool, ids: &[String]) -> Result<Self> {
        if all {
            return Ok(KillTarget::All);
        }
        let ids: BTreeSet<String> = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Err(Error::NoTargetSpecified);
        }
        Ok(KillTarget::Ids(ids))
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            KillTarget::All => true,
            KillTarget::Ids(prefixes) => prefixes.iter().any(|p| id.starts_with(p.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_request_parses_random_and_fixed() {
        assert_eq!("random".parse::<PortRequest>().unwrap(), PortRequest::Random);
        assert_eq!("RANDOM".parse::<PortRequest>().unwrap(), PortRequest::Random);
        assert_eq!("0".parse::<PortRequest>().unwrap(), PortRequest::Random);
        assert_eq!("8081".parse::<PortRequest>().unwrap(), PortRequest::Fixed(8081));
    }

    #[test]
    fn port_request_rejects_garbage() {
        for bad in ["http", "-1", "65536", ""] {
            let err = bad.parse::<PortRequest>().unwrap_err();
            assert!(matches!(err, Error::InvalidPortKind(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn port_request_deserializes_from_yaml() {
        let fixed: PortRequest = serde_yaml::from_str("29419").unwrap();
        assert_eq!(fixed, PortRequest::Fixed(29419));
        let random: PortRequest = serde_yaml::from_str("random").unwrap();
        assert_eq!(random, PortRequest::Random);
        assert!(serde_yaml::from_str::<PortRequest>("70000").is_err());
        assert!(serde_yaml::from_str::<PortRequest>("nope").is_err());
    }

    #[test]
    fn fixed_zero_is_not_a_host_port() {
        assert!(matches!(
            PortRequest::Fixed(0).host_port(),
            Err(Error::InvalidPortKind(_))
        ));
        assert_eq!(PortRequest::Fixed(1).host_port().unwrap(), Some(1));
        assert_eq!(PortRequest::Random.host_port().unwrap(), None);
    }

    #[test]
    fn kill_target_requires_ids_or_all() {
        assert!(matches!(
            KillTarget::from_args(false, &[]),
            Err(Error::NoTargetSpecified)
        ));
        assert!(matches!(
            KillTarget::from_args(false, &["  ".into()]),
            Err(Error::NoTargetSpecified)
        ));
        assert_eq!(KillTarget::from_args(true, &[]).unwrap(), KillTarget::All);
    }

    #[test]
    fn kill_target_matches_by_prefix_only() {
        let target = KillTarget::from_args(false, &["abc".into()]).unwrap();
        assert!(target.matches("abcdef0123"));
        assert!(!target.matches("0abcdef"));
        assert!(!target.matches("ab"));
    }

    #[test]
    fn host_port_lookup() {
        let mut status = ContainerStatus {
            id: "c1".into(),
            status: "running".into(),
            running: true,
            port_mappings: HashMap::new(),
            gateway: "172.17.0.1".into(),
            labels: HashMap::new(),
        };
        assert_eq!(status.host_port(INTERNAL_HTTP_PORT).unwrap(), None);

        status.port_mappings.insert(INTERNAL_HTTP_PORT, vec![32768]);
        assert_eq!(status.host_port(INTERNAL_HTTP_PORT).unwrap(), Some(32768));

        status.port_mappings.insert(INTERNAL_SSH_PORT, vec![1, 2]);
        assert!(matches!(
            status.host_port(INTERNAL_SSH_PORT),
            Err(Error::AmbiguousPortMapping { port: INTERNAL_SSH_PORT, count: 2 })
        ));
    }
}
